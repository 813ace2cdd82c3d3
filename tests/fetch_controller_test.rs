use fetch_orchestrator::clients::OrchestratorClient;
use fetch_orchestrator::lifecycle::{LoadingPolicy, OrchestratorConfig, SingleFetchSystem};
use fetch_orchestrator::mock::{create_mock_transport, expect_call, MockCall, MockTransport};
use fetch_orchestrator::model::{Outcome, ResourceDescriptor};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(2);

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out waiting for the controller")
}

async fn next_call(calls: &mut Calls) -> MockCall<String> {
    within(expect_call(calls)).await.expect("transport dropped")
}

type Calls = mpsc::Receiver<MockCall<String>>;

fn start(target: &str) -> (SingleFetchSystem<String>, Calls) {
    let (transport, calls) = create_mock_transport::<String>(16);
    let system = SingleFetchSystem::start(
        transport,
        ResourceDescriptor::new(target),
        OrchestratorConfig::default(),
    )
    .unwrap();
    (system, calls)
}

#[tokio::test]
async fn test_late_first_attempt_loses_to_refetch() {
    let (system, mut calls) = start("/profile");

    let first = next_call(&mut calls).await;
    assert!(system.client.state().loading);

    system.client.refetch().await.unwrap();
    let second = next_call(&mut calls).await;
    assert!(first.is_cancelled());

    second.succeed("second".to_string());
    first.succeed("first".to_string());

    let state = within(system.client.settled()).await.unwrap();
    assert_eq!(state.data.as_deref(), Some("second"));
    assert_eq!(state.outcome, Outcome::Success("second".to_string()));
    assert_eq!(state.generation.value(), 2);
    assert!(!state.loading);
    assert!(state.response.is_some());

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failure_clears_loading() {
    // The controller ignores the configured policy and always clears loading on settle
    let (system, mut calls) = start("/profile");
    next_call(&mut calls).await.fail("boom");

    let state = within(system.client.settled()).await.unwrap();
    assert_eq!(state.error.as_deref(), Some("boom"));
    assert_eq!(state.data, None);
    assert!(!state.loading);
    assert_eq!(state.outcome, Outcome::Failure("boom".to_string()));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_is_not_an_error() {
    let (system, mut calls) = start("/profile");
    let first = next_call(&mut calls).await;

    system.client.refetch().await.unwrap();
    assert!(first.is_cancelled());
    let state = system.client.state();
    assert_eq!(state.error, None);
    assert!(state.loading);

    next_call(&mut calls).await.succeed("ok".to_string());
    let state = within(system.client.settled()).await.unwrap();
    assert_eq!(state.error, None);
    assert_eq!(state.data.as_deref(), Some("ok"));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_transport_cancellation_clears_loading() {
    let mock = MockTransport::<String>::new();
    mock.expect("/profile").return_cancelled();

    let system = SingleFetchSystem::start(
        mock.clone(),
        ResourceDescriptor::new("/profile"),
        OrchestratorConfig::default(),
    )
    .unwrap();

    let state = within(system.client.wait_for(|state| !state.loading))
        .await
        .unwrap();
    assert_eq!(state.outcome, Outcome::Cancelled);
    assert_eq!(state.error, None);
    assert_eq!(state.data, None);

    mock.verify();
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_set_data_bypasses_network() {
    let (system, mut calls) = start("/profile");
    next_call(&mut calls).await.fail("boom");
    within(system.client.settled()).await.unwrap();

    system
        .client
        .set_data(Some("optimistic".to_string()))
        .await
        .unwrap();

    let state = system.client.state();
    assert_eq!(state.data.as_deref(), Some("optimistic"));
    assert_eq!(state.error.as_deref(), Some("boom"));
    assert!(!state.loading);
    assert_eq!(state.generation.value(), 1);
    assert!(calls.try_recv().is_err());

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_target_change_refetches_and_keeps_data() {
    let (system, mut calls) = start("/users/1");
    next_call(&mut calls).await.succeed("alice".to_string());
    within(system.client.settled()).await.unwrap();

    let changed = system
        .client
        .set_descriptor(ResourceDescriptor::new("/users/2"))
        .await
        .unwrap();
    assert!(changed);

    let call = next_call(&mut calls).await;
    assert_eq!(call.target(), "/users/2");
    let armed = system.client.state();
    assert!(armed.loading);
    assert_eq!(armed.data.as_deref(), Some("alice"));

    call.succeed("bob".to_string());
    let state = within(system.client.settled()).await.unwrap();
    assert_eq!(state.data.as_deref(), Some("bob"));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deps_drive_reactivity() {
    let (system, mut calls) = start("/search");
    next_call(&mut calls).await.succeed("none".to_string());
    within(system.client.settled()).await.unwrap();

    assert!(system.client.set_deps(vec!["rust".to_string()]).await.unwrap());
    next_call(&mut calls).await.succeed("rust results".to_string());
    let state = within(system.client.settled()).await.unwrap();
    assert_eq!(state.data.as_deref(), Some("rust results"));

    assert!(!system.client.set_deps(vec!["rust".to_string()]).await.unwrap());
    assert_eq!(system.client.state().generation.value(), 2);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_state_changes() {
    let mock = MockTransport::<String>::new();
    let pending = mock.expect("/slow").hold();

    let config = OrchestratorConfig::default().with_loading_policy(LoadingPolicy::UntilData);
    let system =
        SingleFetchSystem::start(mock.clone(), ResourceDescriptor::new("/slow"), config).unwrap();
    let client = system.client.clone();

    system.shutdown().await.unwrap();
    pending.succeed("too late".to_string());

    let state = client.state();
    assert!(state.closed);
    assert_eq!(state.data, None);
    assert_eq!(state.outcome, Outcome::Cancelled);
    assert!(!state.loading);
}
