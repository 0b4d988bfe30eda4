//! End-to-end token bridge flows against the in-memory devnet.

use alloy_primitives::{Address, U256};
use nitro_bridge_devnet::{CollectingLayer, Devnet, DevnetProvider, TraceStorage, USER};
use nitro_bridge_gateway::{
    Erc20Bridger, GatewayError, GatewaySetCoordinator, RegistrationParams, RegistrationState,
    RetryableGasParams,
};
use nitro_bridge_messaging::{BridgeError, BridgeProviders};
use nitro_bridge_primitives::{CrossDomainMessage, L1ToL2MessageStatus, L2ToL1MessageStatus};
use nitro_bridge_providers::{BlockTag, PollConfig};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

type Providers = BridgeProviders<DevnetProvider, DevnetProvider>;

fn providers(devnet: &Devnet) -> Providers {
    BridgeProviders::new(devnet.l1(), devnet.l2(), devnet.network())
}

fn poll() -> PollConfig {
    PollConfig::from_millis(1, 5_000).unwrap()
}

/// Deploys a standard token, mints `amount` to the user and deposits all of it.
async fn deposit_standard_token(
    devnet: &Devnet,
    bridger: &Erc20Bridger<DevnetProvider, DevnetProvider>,
    amount: u64,
) -> Address {
    let token = devnet.deploy_token();
    let amount = U256::from(amount);
    devnet.mint_l1(token, USER, amount);
    let l1 = devnet.l1();
    let cancel = CancellationToken::new();

    let approval = bridger.approve_token(token, amount, &l1).await.unwrap();
    assert!(approval.wait(&l1, &poll(), &cancel).await.unwrap().status);

    let pending =
        bridger.deposit(token, amount, &l1, &RetryableGasParams::default()).await.unwrap();
    let receipt = pending.wait(&l1, &poll(), &cancel).await.unwrap();
    assert!(receipt.status);

    let ticket = bridger.deposit_ticket(&receipt).unwrap();
    assert_eq!(ticket.destination_address, devnet.network().token_bridge.l2_erc20_gateway);
    let result = bridger.retryables().wait_for_status(&ticket, &poll(), &cancel).await.unwrap();
    assert_eq!(result.status, L1ToL2MessageStatus::Redeemed);
    token
}

#[tokio::test]
async fn test_standard_deposit_mints_derived_token() {
    let devnet = Devnet::new();
    let bridger = Erc20Bridger::new(providers(&devnet));
    let token = deposit_standard_token(&devnet, &bridger, 100).await;

    let network = devnet.network();
    let l2_token = bridger.l2_token_contract_address(token).await.unwrap();
    assert_eq!(l2_token, network.standard_l2_token_address(token));
    assert_eq!(bridger.l2_balance(token, USER).await.unwrap(), U256::from(100));
    assert_eq!(devnet.l2_balance(l2_token, USER), U256::from(100));
    assert_eq!(bridger.l1_balance(token, USER).await.unwrap(), U256::ZERO);
    assert_eq!(
        devnet.l1_balance(token, network.token_bridge.l1_erc20_gateway),
        U256::from(100)
    );

    let resolver = bridger.resolver();
    assert_eq!(
        resolver.get_l1_gateway_address(token).await.unwrap(),
        network.token_bridge.l1_erc20_gateway
    );
    assert_eq!(
        resolver.get_l2_gateway_address(token).await.unwrap(),
        network.token_bridge.l2_erc20_gateway
    );
}

#[tokio::test]
async fn test_withdrawal_round_trip() {
    let devnet = Devnet::new();
    let bridger = Erc20Bridger::new(providers(&devnet));
    let token = deposit_standard_token(&devnet, &bridger, 100).await;
    let cancel = CancellationToken::new();

    let l2 = devnet.l2();
    let pending = bridger.withdraw(token, U256::from(10), USER, &l2).await.unwrap();
    let receipt = pending.wait(&l2, &poll(), &cancel).await.unwrap();
    assert!(receipt.status);
    assert_eq!(bridger.l2_balance(token, USER).await.unwrap(), U256::from(90));

    let messages = bridger.outbox().from_receipt(&receipt).unwrap();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.caller, devnet.network().token_bridge.l2_erc20_gateway);
    assert_eq!(message.destination, devnet.network().token_bridge.l1_erc20_gateway);
    assert_eq!(bridger.outbox().status(message).await.unwrap(), L2ToL1MessageStatus::Unconfirmed);

    let l1 = devnet.l1();
    let err = bridger.outbox().execute(message, &l1).await.unwrap_err();
    assert_eq!(err, BridgeError::NotConfirmed(message.id()));

    devnet.confirm_assertion();
    assert_eq!(bridger.outbox().status(message).await.unwrap(), L2ToL1MessageStatus::Confirmed);
    let executed = bridger.outbox().execute(message, &l1).await.unwrap();
    assert!(executed.wait(&l1, &poll(), &cancel).await.unwrap().status);
    assert_eq!(bridger.outbox().status(message).await.unwrap(), L2ToL1MessageStatus::Executed);
    assert_eq!(bridger.l1_balance(token, USER).await.unwrap(), U256::from(10));

    let err = bridger.outbox().execute(message, &l1).await.unwrap_err();
    assert_eq!(err, BridgeError::AlreadyExecuted(message.id()));
}

#[tokio::test]
async fn test_withdrawal_events_survive_log_range_limits() {
    let devnet = Devnet::new();
    let bridger = Erc20Bridger::new(providers(&devnet));
    let token = deposit_standard_token(&devnet, &bridger, 100).await;
    let cancel = CancellationToken::new();

    let l2 = devnet.l2();
    for amount in [10u64, 20, 30] {
        let pending = bridger.withdraw(token, U256::from(amount), USER, &l2).await.unwrap();
        assert!(pending.wait(&l2, &poll(), &cancel).await.unwrap().status);
    }
    devnet.set_log_range_limit(Some(1));

    let events =
        bridger.get_l2_withdrawal_events(token, 0, BlockTag::Latest, Some(USER)).await.unwrap();
    let amounts = events.iter().map(|event| event.amount).collect::<Vec<_>>();
    assert_eq!(amounts, vec![U256::from(10), U256::from(20), U256::from(30)]);
    assert!(events.iter().all(|event| event.l1_token == token && event.to == USER));
    assert!(events.windows(2).all(|pair| pair[0].exit_num < pair[1].exit_num));

    let other = Address::repeat_byte(0x42);
    let none =
        bridger.get_l2_withdrawal_events(token, 0, BlockTag::Latest, Some(other)).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_custom_token_registration_completes() {
    let devnet = Devnet::new();
    let network = devnet.network();
    let (l1_token, l2_token) = devnet.deploy_custom_token();
    let coordinator = GatewaySetCoordinator::new(providers(&devnet));
    let resolver = coordinator.resolver();
    assert_eq!(resolver.get_l1_gateway_address(l1_token).await.unwrap(), Address::ZERO);
    assert_eq!(resolver.get_l2_gateway_address(l1_token).await.unwrap(), Address::ZERO);

    let cancel = CancellationToken::new();
    let mut registration = coordinator
        .register_custom_token(
            l1_token,
            l2_token,
            &devnet.l1(),
            &RegistrationParams::default(),
            &poll(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(registration.state(), RegistrationState::TokenMessageSent);
    assert_eq!(
        registration.token_ticket().destination_address,
        network.token_bridge.l2_custom_gateway
    );
    assert_eq!(
        registration.gateway_ticket().destination_address,
        network.token_bridge.l2_gateway_router
    );
    let (token_id, gateway_id) =
        (registration.token_ticket().id(), registration.gateway_ticket().id());
    assert_eq!(token_id.origin_tx_hash, registration.receipt().transaction_hash);
    assert_eq!(gateway_id.origin_tx_hash, registration.receipt().transaction_hash);
    assert!(token_id.sequence_number < gateway_id.sequence_number);

    let state = registration.complete(&coordinator, &poll(), &cancel).await.unwrap();
    assert_eq!(state, RegistrationState::Complete);
    assert_eq!(registration.state(), RegistrationState::Complete);

    let l1_gateway = resolver.get_l1_gateway_address(l1_token).await.unwrap();
    let l2_gateway = resolver.get_l2_gateway_address(l1_token).await.unwrap();
    assert_eq!(l1_gateway, network.token_bridge.l1_custom_gateway);
    assert_eq!(l2_gateway, network.token_bridge.l2_custom_gateway);
    assert_eq!(resolver.l1_to_l2_token_on_l1(l1_gateway, l1_token).await.unwrap(), l2_token);
    assert_eq!(resolver.l1_to_l2_token_on_l2(l2_gateway, l1_token).await.unwrap(), l2_token);
    assert_eq!(resolver.get_l2_token_address(l1_token).await.unwrap(), l2_token);

    // Completing again reports the settled state.
    assert_eq!(
        registration.complete(&coordinator, &poll(), &cancel).await.unwrap(),
        RegistrationState::Complete
    );
}

#[tokio::test]
async fn test_registered_custom_token_deposits_to_counterpart() {
    let devnet = Devnet::new();
    let (l1_token, l2_token) = devnet.deploy_custom_token();
    let providers = providers(&devnet);
    let coordinator = GatewaySetCoordinator::new(providers.clone());
    let bridger = Erc20Bridger::new(providers);
    let cancel = CancellationToken::new();
    let l1 = devnet.l1();

    let mut registration = coordinator
        .register_custom_token(l1_token, l2_token, &l1, &Default::default(), &poll(), &cancel)
        .await
        .unwrap();
    registration.complete(&coordinator, &poll(), &cancel).await.unwrap();

    let amount = U256::from(25);
    devnet.mint_l1(l1_token, USER, amount);
    let approval = bridger.approve_token(l1_token, amount, &l1).await.unwrap();
    assert!(approval.wait(&l1, &poll(), &cancel).await.unwrap().status);
    let pending =
        bridger.deposit(l1_token, amount, &l1, &RetryableGasParams::default()).await.unwrap();
    let receipt = pending.wait(&l1, &poll(), &cancel).await.unwrap();
    let ticket = bridger.deposit_ticket(&receipt).unwrap();
    assert_eq!(
        ticket.destination_address,
        devnet.network().token_bridge.l2_custom_gateway
    );
    let result = bridger.retryables().wait_for_status(&ticket, &poll(), &cancel).await.unwrap();
    assert_eq!(result.status, L1ToL2MessageStatus::Redeemed);
    assert_eq!(devnet.l2_balance(l2_token, USER), amount);
    assert_eq!(bridger.l2_balance(l1_token, USER).await.unwrap(), amount);
}

#[tokio::test]
async fn test_registration_partial_failure_names_router_ticket() {
    let storage = TraceStorage::default();
    let subscriber =
        tracing_subscriber::registry().with(CollectingLayer::new(storage.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let devnet = Devnet::new();
    let network = devnet.network();
    let (l1_token, l2_token) = devnet.deploy_custom_token();
    let coordinator = GatewaySetCoordinator::new(providers(&devnet));
    let cancel = CancellationToken::new();

    let params = RegistrationParams {
        router: RetryableGasParams::default().with_gas_limit(1),
        ..Default::default()
    };
    let mut registration = coordinator
        .register_custom_token(l1_token, l2_token, &devnet.l1(), &params, &poll(), &cancel)
        .await
        .unwrap();
    let err = registration.complete(&coordinator, &poll(), &cancel).await.unwrap_err();
    match err.clone() {
        GatewayError::Bridge(BridgeError::PartialFailure { succeeded, failed }) => {
            assert_eq!(succeeded, vec![registration.token_ticket().id()]);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].id, registration.gateway_ticket().id());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(registration.state(), RegistrationState::Failed);
    assert_eq!(registration.failure(), Some(&err));
    let again = registration.complete(&coordinator, &poll(), &cancel).await.unwrap_err();
    assert_eq!(again, err);

    // The token mapping landed; the router still routes through the default gateway.
    let resolver = coordinator.resolver();
    let l2_custom_gateway = network.token_bridge.l2_custom_gateway;
    assert_eq!(
        resolver.l1_to_l2_token_on_l2(l2_custom_gateway, l1_token).await.unwrap(),
        l2_token
    );
    assert_eq!(resolver.get_l2_gateway_address(l1_token).await.unwrap(), Address::ZERO);
    let err = coordinator.verify_registration(l1_token, l2_token).await.unwrap_err();
    assert!(matches!(err, GatewayError::VerificationFailed { .. }));

    assert!(storage
        .get_by_level(Level::WARN)
        .iter()
        .any(|message| message.contains("Registration partially failed")));

    // A manual redeem of the router ticket finishes the registration.
    let l2 = devnet.l2();
    let retryables = coordinator.retryables();
    let gateway_ticket = registration.gateway_ticket();
    assert_eq!(
        retryables.status(gateway_ticket).await.unwrap(),
        L1ToL2MessageStatus::FundsDepositedOnL2
    );
    let redeem = retryables.redeem(gateway_ticket, &l2).await.unwrap();
    assert!(redeem.wait(&l2, &poll(), &cancel).await.unwrap().status);
    assert_eq!(retryables.status(gateway_ticket).await.unwrap(), L1ToL2MessageStatus::Redeemed);
    coordinator.verify_registration(l1_token, l2_token).await.unwrap();
}

#[tokio::test]
async fn test_registration_with_both_tickets_failing() {
    let devnet = Devnet::new();
    let (l1_token, l2_token) = devnet.deploy_custom_token();
    let coordinator = GatewaySetCoordinator::new(providers(&devnet));
    let cancel = CancellationToken::new();

    let starved = RetryableGasParams::default().with_gas_limit(1);
    let params = RegistrationParams { gateway: starved, router: starved };
    let mut registration = coordinator
        .register_custom_token(l1_token, l2_token, &devnet.l1(), &params, &poll(), &cancel)
        .await
        .unwrap();
    let err = registration.complete(&coordinator, &poll(), &cancel).await.unwrap_err();
    let (failed_token, failed) = match err.clone() {
        GatewayError::RegistrationFailed { l1_token, failed } => (l1_token, failed),
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(failed_token, l1_token);
    let ids = failed.iter().map(|message| message.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![registration.token_ticket().id(), registration.gateway_ticket().id()]);
    assert_eq!(registration.state(), RegistrationState::Failed);
    let again = registration.complete(&coordinator, &poll(), &cancel).await.unwrap_err();
    assert_eq!(again, err);
}

#[tokio::test]
async fn test_registration_of_plain_token_reverts() {
    let devnet = Devnet::new();
    let token = devnet.deploy_token();
    let coordinator = GatewaySetCoordinator::new(providers(&devnet));
    let err = coordinator
        .register_custom_token(
            token,
            Address::repeat_byte(0x11),
            &devnet.l1(),
            &RegistrationParams::default(),
            &poll(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Reverted(_)));
}
