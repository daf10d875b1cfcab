use std::sync::{Arc, Mutex};

use kiln_core::{ExecPhase, KilnError, ProtoPhase};
use kiln_events::{NativeEvent, PlatformNode, RoutedEvent, TargetKind};
use kiln_modules::{ModuleDefinition, ModuleInstance};
use kiln_state::{OwnedStateHandle, StateSpec, StateValue};
use serde_json::json;

use super::*;
use crate::caps::{
    EVENT_GATE_CAP, EventGate, GLOBAL_NODE_CAP, ROOT_NODE_CAP, TRIGGER_SINK_CAP, TriggerSignal,
    TriggerSink,
};
use crate::testing::{TestHost, TestNode};

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: &str) {
    log.lock().unwrap().push(entry.to_owned());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn mount<S: Send + Sync + 'static>(
    prototype: &Prototype<S>,
    host: &Arc<TestHost>,
) -> KilnResult<ComponentInstance> {
    let host: Arc<dyn Host> = host.clone();
    ComponentInstance::mount(prototype, host, RuntimeOptions::default())
}

fn root_node_entry(node: &Arc<TestNode>) -> kiln_capabilities::CapEntry {
    let node: Arc<dyn PlatformNode> = node.clone();
    ROOT_NODE_CAP.entry(node)
}

/// A prototype with one `count` cell, rendering `{ "count": n }`.
fn counter(log: &Log) -> Prototype<OwnedStateHandle<f64>> {
    let setup_log = Arc::clone(log);
    let render_log = Arc::clone(log);
    Prototype::new(
        "counter",
        move |ctx| {
            push(&setup_log, "setup");
            for (phase, label) in [
                (ProtoPhase::Created, "created"),
                (ProtoPhase::Mounted, "mounted"),
                (ProtoPhase::Updated, "updated"),
                (ProtoPhase::Unmounted, "unmounted"),
            ] {
                let log = Arc::clone(&setup_log);
                let callback = move || {
                    push(&log, label);
                    Ok(())
                };
                match phase {
                    ProtoPhase::Created => ctx.lifecycle().on_created(callback)?,
                    ProtoPhase::Mounted => ctx.lifecycle().on_mounted(callback)?,
                    ProtoPhase::Updated => ctx.lifecycle().on_updated(callback)?,
                    _ => ctx.lifecycle().on_unmounted(callback)?,
                }
            }
            ctx.state()
                .owned("count", StateSpec::range(0.0, 100.0, false), 0.0)
        },
        move |ctx, count| {
            assert_eq!(ctx.guard().exec_phase(), ExecPhase::Render);
            push(&render_log, "render");
            Ok(json!({ "count": count.get()? }))
        },
    )
}

#[test]
fn test_mount_runs_phases_in_order() {
    let log = Log::default();
    let host = Arc::new(TestHost::new("counter"));
    let instance = mount(&counter(&log), &host).unwrap();

    assert_eq!(instance.proto_phase(), ProtoPhase::Mounted);
    assert_eq!(entries(&log), ["setup", "created", "render", "mounted"]);
    assert_eq!(host.views.lock().unwrap()[0], json!({ "count": 0.0 }));
    assert_eq!(instance.commit_count(), 1);
    assert_eq!(instance.guard().exec_phase(), ExecPhase::Unknown);
}

#[test]
fn test_mounted_waits_for_commit_done() {
    let log = Log::default();
    let host = Arc::new(TestHost::new("counter").manual_done());
    let instance = mount(&counter(&log), &host).unwrap();
    assert_eq!(instance.proto_phase(), ProtoPhase::Created);

    let signals = host.take_signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].sequence(), 0);
    signals[0].done().unwrap();
    signals[0].done().unwrap();
    assert!(signals[0].is_done());

    assert_eq!(instance.proto_phase(), ProtoPhase::Mounted);
    assert_eq!(entries(&log), ["setup", "created", "render", "mounted"]);
}

#[test]
fn test_state_change_schedules_one_coalesced_render() {
    let log = Log::default();
    let handle: Arc<Mutex<Option<OwnedStateHandle<f64>>>> = Arc::default();
    let slot = Arc::clone(&handle);
    let inner = counter(&log);
    let prototype = Prototype::new(
        "counter",
        move |ctx| {
            let count = inner.run_setup(ctx)?;
            *slot.lock().unwrap() = Some(count.clone());
            Ok(count)
        },
        |_ctx, count| Ok(json!({ "count": count.get()? })),
    );

    let host = Arc::new(TestHost::new("counter"));
    let instance = mount(&prototype, &host).unwrap();
    let count = handle.lock().unwrap().clone().unwrap();

    count.set(1.0).unwrap();
    count.set(2.0).unwrap();
    assert_eq!(host.pending_tasks(), 1);
    assert_eq!(host.run_tasks().unwrap(), 1);

    assert_eq!(host.commits(), 2);
    assert_eq!(host.views.lock().unwrap()[1], json!({ "count": 2.0 }));
    assert_eq!(instance.proto_phase(), ProtoPhase::Updated);
    assert_eq!(entries(&log).last().unwrap(), "updated");
}

#[test]
fn test_uncoalesced_updates_render_each_request() {
    let log = Log::default();
    let host = Arc::new(TestHost::new("counter"));
    let host_dyn: Arc<dyn Host> = host.clone();
    let instance = ComponentInstance::mount(
        &counter(&log),
        host_dyn,
        RuntimeOptions::default().with_coalesce_updates(false),
    )
    .unwrap();

    instance.request_update();
    instance.request_update();
    assert_eq!(host.run_tasks().unwrap(), 2);
    assert_eq!(host.commits(), 3);
}

#[test]
fn test_update_request_during_setup_is_ignored() {
    let host = Arc::new(TestHost::new("quiet"));
    let prototype = Prototype::new(
        "quiet",
        |ctx| {
            ctx.request_update();
            Ok(())
        },
        |_ctx, ()| Ok(json!(null)),
    );
    let _instance = mount(&prototype, &host).unwrap();
    assert_eq!(host.pending_tasks(), 0);
    assert_eq!(host.commits(), 1);
}

#[test]
fn test_state_phase_discipline() {
    let host = Arc::new(TestHost::new("flags"));
    let prototype = Prototype::new(
        "flags",
        |ctx| {
            let flag = ctx.state().owned("flag", StateSpec::Bool, false)?;
            let err = flag.set(true).unwrap_err();
            assert!(matches!(err, KilnError::ExecPhaseViolation { .. }));
            flag.set_default(true)?;
            Ok(flag)
        },
        |_ctx, flag| Ok(json!({ "flag": flag.get()? })),
    );
    let instance = mount(&prototype, &host).unwrap();

    let snapshot = instance.state_snapshot().unwrap();
    assert_eq!(snapshot["flag"], StateValue::Bool(true));

    let cell = instance.core.ports.state.cell("flag").unwrap();
    let err = cell.set_default(StateValue::Bool(false)).unwrap_err();
    assert!(matches!(err, KilnError::ExecPhaseViolation { .. }));
    let err = cell.set(StateValue::String("yes".into()), None).unwrap_err();
    assert_eq!(err.code(), "STATE_SPEC_VIOLATION");
    assert_eq!(cell.get().unwrap(), StateValue::Bool(true));
}

#[test]
fn test_unmount_keeps_state_live_during_callback() {
    let observed: Log = Log::default();
    let handle: Arc<Mutex<Option<OwnedStateHandle<f64>>>> = Arc::default();
    let slot = Arc::clone(&handle);
    let seen = Arc::clone(&observed);
    let prototype = Prototype::new(
        "counter",
        move |ctx| {
            let count = ctx
                .state()
                .owned("count", StateSpec::range(0.0, 10.0, true), 1.0)?;
            *slot.lock().unwrap() = Some(count.clone());
            let during = count.clone();
            let seen = Arc::clone(&seen);
            let guard_ctx = ctx.clone();
            ctx.lifecycle().on_unmounted(move || {
                assert!(!guard_ctx.guard().is_disposed());
                assert!(guard_ctx.callback_ctx().is_some());
                during.set(during.get()? + 1.0)?;
                push(&seen, &format!("count={}", during.get()?));
                Ok(())
            })?;
            Ok(count)
        },
        |_ctx, count| Ok(json!(count.get()?)),
    );

    let host = Arc::new(TestHost::new("counter"));
    let instance = mount(&prototype, &host).unwrap();
    instance.unmount().unwrap();

    assert!(host.unmount_begun.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(entries(&observed), ["count=2"]);
    assert!(instance.is_disposed());

    let count = handle.lock().unwrap().clone().unwrap();
    assert!(count.get().unwrap_err().is_disposed());
    assert!(count.set(3.0).unwrap_err().is_disposed());
    assert!(instance.unmount().unwrap_err().is_disposed());
    instance.dispose().unwrap();
    assert_eq!(host.pending_tasks(), 0);
}

#[test]
fn test_unmounted_callback_error_still_disposes() {
    let host = Arc::new(TestHost::new("failing"));
    let prototype = Prototype::new(
        "failing",
        |ctx| {
            ctx.lifecycle().on_unmounted(|| {
                Err(KilnError::EventTargetUnavailable {
                    kind: "root".into(),
                })
            })
        },
        |_ctx, ()| Ok(json!(null)),
    );
    let instance = mount(&prototype, &host).unwrap();

    let err = instance.unmount().unwrap_err();
    assert_eq!(err.code(), "EVENT_TARGET_UNAVAILABLE");
    assert!(instance.is_disposed());
    assert!(!instance.vault().has(&SYS_CAP));
}

#[test]
fn test_failed_setup_disposes_partial_instance() {
    let captured: Arc<Mutex<Option<ComponentCtx>>> = Arc::default();
    let slot = Arc::clone(&captured);
    let host = Arc::new(TestHost::new("broken"));
    let prototype: Prototype<()> = Prototype::new(
        "broken",
        move |ctx| {
            *slot.lock().unwrap() = Some(ctx.clone());
            Err(KilnError::disposed("boom"))
        },
        |_ctx, ()| Ok(json!(null)),
    );

    let err = mount(&prototype, &host).unwrap_err();
    assert_eq!(err, KilnError::disposed("boom"));
    assert_eq!(host.commits(), 0);

    let ctx = captured.lock().unwrap().clone().unwrap();
    assert!(ctx.guard().is_disposed());
    assert!(!ctx.vault().has(&SYS_CAP));
}

#[test]
fn test_extra_module_cycle_fails_mount() {
    let a = ModuleDefinition::new("a", |_| Ok(ModuleInstance::new(Arc::new(())))).with_dep("b");
    let b = ModuleDefinition::new("b", |_| Ok(ModuleInstance::new(Arc::new(())))).with_dep("a");
    let prototype = Prototype::new("cyclic", |_| Ok(()), |_ctx, ()| Ok(json!(null)))
        .with_module(a)
        .with_module(b);

    let host = Arc::new(TestHost::new("cyclic"));
    let err = mount(&prototype, &host).unwrap_err();
    assert_eq!(err.code(), "DEPENDENCY_CYCLE");
}

#[test]
fn test_extra_module_sees_builtins_and_guard() {
    struct Tally(Arc<kiln_core::ExecPhaseGuard>);

    let tally = ModuleDefinition::new("tally", |ctx| {
        ctx.deps().require_facade::<crate::modules::state::StateModule>("state")?;
        let guard = ctx.vault().get(&SYS_CAP)?;
        Ok(ModuleInstance::new(Arc::new(Tally(guard))))
    })
    .with_dep("state");

    let prototype = Prototype::new(
        "tallied",
        |ctx| {
            let tally = ctx.module::<Tally>("tally")?;
            assert_eq!(tally.0.proto_phase(), ProtoPhase::Setup);
            Ok(())
        },
        |_ctx, ()| Ok(json!(null)),
    )
    .with_module(tally);

    let host = Arc::new(TestHost::new("tallied"));
    let instance = mount(&prototype, &host).unwrap();
    assert_eq!(instance.ctx().module::<Tally>("tally").unwrap().0.proto_phase(), ProtoPhase::Mounted);
}

fn clicker(log: &Log) -> Prototype<OwnedStateHandle<f64>> {
    let log = Arc::clone(log);
    Prototype::new(
        "clicker",
        move |ctx| {
            let presses = ctx
                .state()
                .owned("presses", StateSpec::range(0.0, 100.0, true), 0.0)?;
            let counter = presses.clone();
            ctx.event().on(TargetKind::Root, "press.commit", move |event| {
                counter.set(counter.get()? + 1.0)?;
                assert!(event.as_semantic().is_some());
                Ok(())
            })?;
            let native_log = Arc::clone(&log);
            ctx.event()
                .on(TargetKind::Root, "native:click", move |event: &RoutedEvent| {
                    push(&native_log, &event.to_string());
                    Ok(())
                })?;
            Ok(presses)
        },
        |_ctx, presses| Ok(json!({ "presses": presses.get()? })),
    )
}

#[test]
fn test_setup_handlers_bind_on_created_and_write_state() {
    let log = Log::default();
    let node = Arc::new(TestNode::default());
    let host = Arc::new(TestHost::new("clicker").wire(root_node_entry(&node)));
    let instance = mount(&clicker(&log), &host).unwrap();

    assert_eq!(node.bound(), ["click", "keydown"]);
    node.fire(NativeEvent::mouse("click")).unwrap();
    node.fire(NativeEvent::keyboard("keydown", "Enter", "Enter")).unwrap();
    node.fire(NativeEvent::keyboard("keydown", "a", "KeyA")).unwrap();

    assert_eq!(
        instance.state_snapshot().unwrap()["presses"],
        StateValue::Number(2.0)
    );
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(host.run_tasks().unwrap(), 1);
    assert_eq!(host.views.lock().unwrap()[1], json!({ "presses": 2.0 }));

    instance.unmount().unwrap();
    assert!(node.bound().is_empty());
    node.fire(NativeEvent::mouse("click")).unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_missing_root_node_fails_mount() {
    let log = Log::default();
    let host = Arc::new(TestHost::new("clicker"));
    let err = mount(&clicker(&log), &host).unwrap_err();
    assert_eq!(
        err,
        KilnError::EventTargetUnavailable {
            kind: "root".into()
        }
    );
    assert_eq!(host.commits(), 0);
}

#[test]
fn test_global_node_only_required_by_global_registrations() {
    let node = Arc::new(TestNode::default());
    let root_only = Prototype::new(
        "root-only",
        |ctx| {
            ctx.event()
                .on(TargetKind::Root, "pointer.down", |_event| Ok(()))?;
            Ok(())
        },
        |_ctx, ()| Ok(json!(null)),
    );
    let host = Arc::new(TestHost::new("root-only").wire(root_node_entry(&node)));
    assert!(mount(&root_only, &host).is_ok());

    let with_global = Prototype::new(
        "keys",
        |ctx| {
            ctx.event().on(TargetKind::Global, "key.down", |_event| Ok(()))?;
            Ok(())
        },
        |_ctx, ()| Ok(json!(null)),
    );
    let host = Arc::new(TestHost::new("keys").wire(root_node_entry(&node)));
    let err = mount(&with_global, &host).unwrap_err();
    assert_eq!(err.code(), "EVENT_TARGET_UNAVAILABLE");

    let global = Arc::new(TestNode::default());
    let global_dyn: Arc<dyn PlatformNode> = global.clone();
    let host = Arc::new(
        TestHost::new("keys")
            .wire(root_node_entry(&node))
            .wire(GLOBAL_NODE_CAP.entry(global_dyn)),
    );
    let _instance = mount(&with_global, &host).unwrap();
    assert_eq!(global.bound(), ["keydown"]);
}

#[test]
fn test_off_removes_queued_and_bound_handlers() {
    let node = Arc::new(TestNode::default());
    let tokens: Arc<Mutex<Vec<crate::EventListenerToken>>> = Arc::default();
    let slot = Arc::clone(&tokens);
    let prototype = Prototype::new(
        "toggle",
        move |ctx| {
            let queued = ctx.event().on(TargetKind::Root, "native:click", |_| Ok(()))?;
            assert!(ctx.event().off(&queued));
            let kept = ctx.event().on(TargetKind::Root, "pointer.down", |_| Ok(()))?;
            slot.lock().unwrap().push(kept);
            Ok(())
        },
        |_ctx, ()| Ok(json!(null)),
    );
    let host = Arc::new(TestHost::new("toggle").wire(root_node_entry(&node)));
    let instance = mount(&prototype, &host).unwrap();
    assert_eq!(node.bound(), ["pointerdown"]);

    let kept = tokens.lock().unwrap().pop().unwrap();
    assert_eq!(kept.registration(), "pointer.down");
    assert!(instance.ctx().event().off(&kept));
    assert!(!instance.ctx().event().off(&kept));
    assert!(node.bound().is_empty());
}

#[test]
fn test_event_gate_capability_suppresses_delivery() {
    let log = Log::default();
    let node = Arc::new(TestNode::default());
    let enabled = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let flag = Arc::clone(&enabled);
    let gate = EventGate::new(move || flag.load(std::sync::atomic::Ordering::SeqCst));
    let host = Arc::new(
        TestHost::new("clicker")
            .wire(root_node_entry(&node))
            .wire(EVENT_GATE_CAP.entry(gate)),
    );
    let instance = mount(&clicker(&log), &host).unwrap();

    enabled.store(false, std::sync::atomic::Ordering::SeqCst);
    node.fire(NativeEvent::mouse("click")).unwrap();
    assert!(log.lock().unwrap().is_empty());

    enabled.store(true, std::sync::atomic::Ordering::SeqCst);
    node.fire(NativeEvent::mouse("click")).unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(
        instance.state_snapshot().unwrap()["presses"],
        StateValue::Number(1.0)
    );
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<TriggerSignal>>);

impl TriggerSink for RecordingSink {
    fn trigger(&self, signal: TriggerSignal) -> KilnResult<()> {
        self.0.lock().unwrap().push(signal);
        Ok(())
    }
}

#[test]
fn test_as_trigger_forwards_presses_unless_disabled() {
    let node = Arc::new(TestNode::default());
    let sink = Arc::new(RecordingSink::default());
    let sink_dyn: Arc<dyn TriggerSink> = sink.clone();
    let host = Arc::new(
        TestHost::new("button")
            .wire(root_node_entry(&node))
            .wire(TRIGGER_SINK_CAP.entry(sink_dyn)),
    );
    let prototype = Prototype::new(
        "button",
        |ctx| {
            ctx.trigger().enable()?;
            ctx.trigger().enable()?;
            ctx.trigger().set_disabled(false)
        },
        |ctx, ()| Ok(json!({ "disabled": ctx.trigger().is_disabled()? })),
    );
    let instance = mount(&prototype, &host).unwrap();

    node.fire(NativeEvent::mouse("click")).unwrap();
    {
        let signals = sink.0.lock().unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].prototype, "button");
        assert_eq!(signals[0].event.event_type(), "click");
    }

    instance.ctx().trigger().set_disabled(true).unwrap();
    assert_eq!(
        instance.state_snapshot().unwrap()["trigger.disabled"],
        StateValue::Bool(true)
    );
    node.fire(NativeEvent::keyboard("keydown", " ", "Space")).unwrap();
    assert_eq!(sink.0.lock().unwrap().len(), 1);

    host.run_tasks().unwrap();
    assert_eq!(host.views.lock().unwrap()[1], json!({ "disabled": true }));
}

#[test]
fn test_expose_and_context() {
    let host = Arc::new(TestHost::new("dialog").with_props(json!({ "title": "Hi" })));
    let prototype = Prototype::new(
        "dialog",
        |ctx| {
            assert_eq!(ctx.props().get("title")?, Some(json!("Hi")));
            ctx.expose().value("kind", json!("dialog"))?;
            ctx.expose().method("double", |args| {
                let n = args.as_f64().unwrap_or_default();
                Ok(json!(n * 2.0))
            })?;
            ctx.context().provide("theme", json!("dark"))?;
            assert_eq!(ctx.context().consume("locale")?, None);
            Ok(())
        },
        |_ctx, ()| Ok(json!(null)),
    );
    let instance = mount(&prototype, &host).unwrap();

    assert_eq!(instance.expose_get("kind").unwrap(), Some(json!("dialog")));
    assert_eq!(
        instance.expose_call("double", json!(21)).unwrap(),
        Some(json!(42.0))
    );
    assert_eq!(instance.expose_call("missing", json!(null)).unwrap(), None);
    assert_eq!(instance.provided_context("theme"), Some(json!("dark")));

    let err = instance.ctx().expose().value("late", json!(1)).unwrap_err();
    assert!(matches!(err, KilnError::ExecPhaseViolation { .. }));

    instance.unmount().unwrap();
    assert!(instance.expose_get("kind").unwrap_err().is_disposed());
    assert_eq!(instance.provided_context("theme"), None);
}

#[test]
fn test_commit_signal_after_disposal_is_ignored() {
    let log = Log::default();
    let host = Arc::new(TestHost::new("counter").manual_done());
    let instance = mount(&counter(&log), &host).unwrap();
    let signals = host.take_signals();

    instance.unmount().unwrap();
    signals[0].done().unwrap();
    assert!(!entries(&log).contains(&"mounted".to_owned()));
}

#[test]
fn test_drop_disposes_live_instance() {
    let log = Log::default();
    let host = Arc::new(TestHost::new("counter"));
    let instance = mount(&counter(&log), &host).unwrap();
    let ctx = instance.ctx().clone();

    drop(instance);
    assert!(ctx.guard().is_disposed());
    assert_eq!(entries(&log).last().unwrap(), "unmounted");
    ctx.request_update();
    assert_eq!(host.pending_tasks(), 0);
}

#[test]
fn test_render_cannot_write_state() {
    let host = Arc::new(TestHost::new("sneaky"));
    let prototype = Prototype::new(
        "sneaky",
        |ctx| ctx.state().owned("n", StateSpec::range(0.0, 1.0, true), 0.0),
        |_ctx, n| {
            n.set(1.0)?;
            Ok(json!(null))
        },
    );
    let err = mount(&prototype, &host).unwrap_err();
    assert!(matches!(err, KilnError::ExecPhaseViolation { .. }));
}
