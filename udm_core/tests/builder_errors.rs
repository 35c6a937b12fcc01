use std::sync::Arc;

use udm_core::mocks::{EchoLevel, NullOutput};
use udm_core::{BuildError, ControllerCfg, Orchestrator};

fn kind(err: &eyre::Report) -> Option<&BuildError> {
    err.downcast_ref::<BuildError>()
}

#[test]
fn missing_echo_is_reported() {
    let err = Orchestrator::builder()
        .trigger(NullOutput)
        .display(NullOutput)
        .try_build()
        .unwrap_err();
    assert!(matches!(kind(&err), Some(BuildError::MissingEcho)));
}

#[test]
fn missing_trigger_and_display_are_reported() {
    let err = Orchestrator::builder()
        .echo(Arc::new(EchoLevel::new()))
        .display(NullOutput)
        .try_build()
        .unwrap_err();
    assert!(matches!(kind(&err), Some(BuildError::MissingTrigger)));

    let err = Orchestrator::builder()
        .echo(Arc::new(EchoLevel::new()))
        .trigger(NullOutput)
        .try_build()
        .unwrap_err();
    assert!(matches!(kind(&err), Some(BuildError::MissingDisplay)));
}

#[test]
fn invalid_timing_is_rejected() {
    let mut cfg = ControllerCfg::default();
    cfg.timing.echo_rate = 48;
    let err = Orchestrator::builder()
        .config(cfg)
        .echo(Arc::new(EchoLevel::new()))
        .trigger(NullOutput)
        .display(NullOutput)
        .try_build()
        .unwrap_err();
    assert!(matches!(kind(&err), Some(BuildError::InvalidConfig(_))));

    let mut cfg = ControllerCfg::default();
    cfg.timing.slow_tick_us = cfg.timing.fast_tick_us;
    let err = Orchestrator::builder()
        .config(cfg)
        .echo(Arc::new(EchoLevel::new()))
        .trigger(NullOutput)
        .display(NullOutput)
        .try_build()
        .unwrap_err();
    assert!(matches!(kind(&err), Some(BuildError::InvalidConfig(_))));
}

#[test]
fn minimal_build_uses_defaults() {
    let orch = Orchestrator::builder()
        .echo(Arc::new(EchoLevel::new()))
        .trigger(NullOutput)
        .display(NullOutput)
        .try_build()
        .unwrap();
    assert_eq!(orch.threshold_cm(), 35);
    assert!(orch.store().is_none());
    assert!(!orch.slot().is_armed());
}
