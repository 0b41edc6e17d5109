mod support;

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use pickup_core::{
    AccessToken, DeliveryMethod, FulfillmentOrderStatus, LineItemQuantity, OverrideTable,
    RemoteError, RemoteSystem, SourceOrder, SourceOrderId, SourceSystem, StatusCode,
};
use pickup_sync::{
    pipeline, EngineSettings, IdentifierResolver, OrderPlan, OutcomeKind, PlannedAction,
    Reconciler, RunScope, SkipReason, TargetInspection, TickStatus,
};

use rstest::rstest;
use support::*;

fn kinds(report: &pickup_sync::TickReport) -> Vec<(u64, OutcomeKind)> {
    report
        .outcomes
        .iter()
        .map(|o| (o.source_order.0, o.kind.clone()))
        .collect()
}

// =============================================================================
// Happy path and idempotence
// =============================================================================

#[test]
fn open_pickup_order_is_prepared_tagged_and_written_back() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![open_pickup("fo-1", &[2])],
    )]));

    let report = reconciler(&source, &target).run_once();

    assert_eq!(report.status, TickStatus::Completed);
    assert_eq!(
        kinds(&report),
        vec![(1, OutcomeKind::Succeeded { transitioned: true })]
    );
    assert_eq!(
        target.mutations(),
        vec![
            Mutation::Prepare {
                fulfillment_order: "fo-1".into(),
                lines: vec![LineItemQuantity {
                    id: "fo-1/line-0".into(),
                    quantity: 2
                }],
            },
            Mutation::Tag {
                order: "gid://shopify/Order/5001".into(),
                tags: vec![MARKER.into()],
            },
        ]
    );
    assert_eq!(source.writes(), vec![(SourceOrderId(1), TERMINAL)]);
    assert_eq!(source.status_of(1), TERMINAL);
}

#[test]
fn second_run_issues_no_target_mutations() {
    let source = Arc::new(FakeSource::with_orders([
        source_order(1, Some("5001")),
        source_order(2, Some("5002")),
    ]));
    let target = Arc::new(FakeTarget::with_views([
        target_view("5001", vec![open_pickup("fo-1", &[1])]),
        target_view("5002", Vec::new()),
    ]));
    let engine = reconciler(&source, &target);

    engine.run_once();
    let after_first = target.mutations().len();
    let second = engine.run_once();

    assert_eq!(target.mutations().len(), after_first);
    assert!(second.outcomes.is_empty(), "handled orders are no longer candidates");
}

#[test]
fn rerun_without_marker_or_writeback_does_not_prepare_again() {
    // Neither the tag nor the write-back lands, so the order is fully
    // reprocessed; the state machine alone must keep it from re-preparing.
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![open_pickup("fo-1", &[1])],
    )]));
    target.fail_tags();
    source.fail_writes_for(1);
    let engine = reconciler(&source, &target);

    engine.run_once();
    let second = engine.run_once();

    assert_eq!(target.fulfillment_mutations().len(), 1);
    assert_eq!(
        second.outcomes[0].kind,
        OutcomeKind::SourceWritebackFailed {
            reason: "source transport error: connection reset".into(),
            transitioned: false,
        }
    );
}

// =============================================================================
// Failure containment
// =============================================================================

#[test]
fn transport_error_on_one_order_does_not_abort_the_batch() {
    let source = Arc::new(FakeSource::with_orders([
        source_order(1, Some("5001")),
        source_order(2, Some("5002")),
        source_order(3, Some("5003")),
    ]));
    let target = Arc::new(FakeTarget::with_views([
        target_view("5001", vec![open_pickup("fo-1", &[1])]),
        target_view("5002", vec![open_pickup("fo-2", &[1])]),
        target_view("5003", vec![open_pickup("fo-3", &[1])]),
    ]));
    target.fail_load("5002");

    let report = reconciler(&source, &target).run_once();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[0].kind, OutcomeKind::Succeeded { transitioned: true });
    assert!(matches!(
        report.outcomes[1].kind,
        OutcomeKind::TargetTransitionFailed { partial: false, .. }
    ));
    assert_eq!(report.outcomes[2].kind, OutcomeKind::Succeeded { transitioned: true });
    assert_eq!(
        source.writes(),
        vec![(SourceOrderId(1), TERMINAL), (SourceOrderId(3), TERMINAL)]
    );
}

#[test]
fn partial_transition_never_writes_back() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![open_pickup("fo-a", &[1]), open_pickup("fo-b", &[3])],
    )]));
    target.fail_prepare("fo-b");

    let report = reconciler(&source, &target).run_once();

    match &report.outcomes[0].kind {
        OutcomeKind::TargetTransitionFailed { reason, partial } => {
            assert!(*partial);
            assert!(reason.contains("fo-b"), "reason: {reason}");
        }
        other => panic!("expected target failure, got {other:?}"),
    }
    assert!(source.writes().is_empty());
    assert!(
        !target.mutations().iter().any(|m| matches!(m, Mutation::Tag { .. })),
        "failed transitions are not marked"
    );
}

#[test]
fn on_hold_fulfillment_order_is_a_hard_failure() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![fulfillment_order(
            "fo-1",
            FulfillmentOrderStatus::OnHold,
            DeliveryMethod::Pickup,
            &[1],
        )],
    )]));

    let report = reconciler(&source, &target).run_once();

    assert!(matches!(
        report.outcomes[0].kind,
        OutcomeKind::TargetTransitionFailed { partial: false, .. }
    ));
    assert!(target.mutations().is_empty());
    assert!(source.writes().is_empty());
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn override_table_redirects_the_target_lookup() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("2143"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5804091048247",
        vec![open_pickup("fo-1", &[1])],
    )]));
    let engine = reconciler_with(
        StaticCredentials::authorized(),
        &source,
        &target,
        OverrideTable::from_entries([("2143", "5804091048247")]),
    );

    let report = engine.run_once();

    assert_eq!(target.loads(), vec!["gid://shopify/Order/5804091048247".to_string()]);
    assert_eq!(report.outcomes[0].cross_reference.as_deref(), Some("2143"));
    assert_eq!(report.outcomes[0].kind, OutcomeKind::Succeeded { transitioned: true });
}

#[test]
fn missing_cross_reference_is_skipped_without_target_calls() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, None)]));
    let target = Arc::new(FakeTarget::default());

    let report = reconciler(&source, &target).run_once();

    assert_eq!(
        kinds(&report),
        vec![(
            1,
            OutcomeKind::Skipped {
                reason: SkipReason::NoCrossReference
            }
        )]
    );
    assert!(target.loads().is_empty());
    assert!(source.writes().is_empty());
}

#[test]
fn malformed_cross_reference_is_skipped_without_target_calls() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("#1001"))]));
    let target = Arc::new(FakeTarget::default());

    let report = reconciler(&source, &target).run_once();

    assert_eq!(
        kinds(&report),
        vec![(
            1,
            OutcomeKind::Skipped {
                reason: SkipReason::MalformedReference
            }
        )]
    );
    assert_eq!(report.outcomes[0].cross_reference.as_deref(), Some("#1001"));
    assert!(target.loads().is_empty());
    assert!(target.mutations().is_empty());
    assert!(source.writes().is_empty());
}

#[test]
fn unknown_target_order_is_skipped_as_not_found() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("999"))]));
    let target = Arc::new(FakeTarget::default());

    let report = reconciler(&source, &target).run_once();

    assert_eq!(
        report.outcomes[0].kind,
        OutcomeKind::Skipped {
            reason: SkipReason::NotFound
        }
    );
    assert!(source.writes().is_empty());
}

// =============================================================================
// State-machine scenarios
// =============================================================================

#[test]
fn order_without_fulfillment_order_is_created_then_prepared() {
    let mut view = target_view("5001", Vec::new());
    view.line_items = vec![
        pickup_core::OrderLineItem {
            id: "line-a".into(),
            title: "Bolo".into(),
            quantity: 2,
            unfulfilled_quantity: 2,
        },
        pickup_core::OrderLineItem {
            id: "line-b".into(),
            title: "Torta".into(),
            quantity: 1,
            unfulfilled_quantity: 1,
        },
    ];
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([view]));

    let report = reconciler(&source, &target).run_once();

    assert_eq!(report.outcomes[0].kind, OutcomeKind::Succeeded { transitioned: true });
    let fulfillment = target.fulfillment_mutations();
    assert_eq!(fulfillment.len(), 2);
    match &fulfillment[0] {
        Mutation::Create { lines, .. } => {
            let ids: Vec<&str> = lines.iter().map(|l| l.id.as_str()).collect();
            assert_eq!(ids, vec!["line-a", "line-b"]);
        }
        other => panic!("expected create first, got {other:?}"),
    }
    match &fulfillment[1] {
        Mutation::Prepare { lines, .. } => assert_eq!(lines.len(), 2),
        other => panic!("expected prepare second, got {other:?}"),
    }
    let settled = target.view("5001");
    assert_eq!(
        settled.fulfillment_orders[0].status,
        FulfillmentOrderStatus::InProgress
    );
    assert_eq!(source.writes(), vec![(SourceOrderId(1), TERMINAL)]);
}

fn unfulfilled_view(name: &str) -> pickup_core::TargetOrderView {
    let mut view = target_view(name, Vec::new());
    view.line_items = vec![pickup_core::OrderLineItem {
        id: "line-a".into(),
        title: "Bolo".into(),
        quantity: 2,
        unfulfilled_quantity: 2,
    }];
    view
}

#[rstest]
#[case::create_rejected(CreateBehavior::Reject, false, "creating pickup fulfillment")]
#[case::reload_fails(CreateBehavior::BreakReload, true, "reloading after fulfillment create")]
#[case::still_no_fulfillment_order(
    CreateBehavior::Vanish,
    true,
    "no fulfillment order after fulfillment create"
)]
#[case::created_as_shipping(
    CreateBehavior::Shipping,
    true,
    "created fulfillment has no pickup fulfillment order"
)]
fn failed_create_path_leaves_source_and_tags_alone(
    #[case] behavior: CreateBehavior,
    #[case] expected_partial: bool,
    #[case] expected_reason: &str,
) {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([unfulfilled_view("5001")]));
    target.on_create(behavior);

    let report = reconciler(&source, &target).run_once();

    match &report.outcomes[0].kind {
        OutcomeKind::TargetTransitionFailed { reason, partial } => {
            assert_eq!(*partial, expected_partial);
            assert!(
                reason.contains(expected_reason),
                "unexpected reason: {reason}"
            );
        }
        other => panic!("expected target transition failure, got {other:?}"),
    }
    assert!(matches!(
        target.fulfillment_mutations().first(),
        Some(Mutation::Create { .. })
    ));
    assert!(!target
        .fulfillment_mutations()
        .iter()
        .any(|m| matches!(m, Mutation::Prepare { .. })));
    assert!(target.tag_mutations().is_empty());
    assert!(source.writes().is_empty());
}

#[test]
fn closed_order_is_a_no_op_that_still_writes_back() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![fulfillment_order(
            "fo-1",
            FulfillmentOrderStatus::Closed,
            DeliveryMethod::Pickup,
            &[0],
        )],
    )]));

    let report = reconciler(&source, &target).run_once();

    assert_eq!(report.outcomes[0].kind, OutcomeKind::Succeeded { transitioned: false });
    assert!(target.mutations().is_empty());
    assert_eq!(source.writes(), vec![(SourceOrderId(1), TERMINAL)]);
}

#[test]
fn shipping_order_is_excluded_entirely() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![fulfillment_order(
            "fo-1",
            FulfillmentOrderStatus::Open,
            DeliveryMethod::Shipping,
            &[1],
        )],
    )]));

    let report = reconciler(&source, &target).run_once();

    assert_eq!(
        report.outcomes[0].kind,
        OutcomeKind::Skipped {
            reason: SkipReason::NotPickup
        }
    );
    assert!(target.mutations().is_empty());
    assert!(source.writes().is_empty());
}

#[test]
fn writeback_failure_is_retried_without_retransition() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![open_pickup("fo-1", &[1])],
    )]));
    source.fail_writes_for(1);
    let engine = reconciler(&source, &target);

    let first = engine.run_once();
    match &first.outcomes[0].kind {
        OutcomeKind::SourceWritebackFailed { transitioned, .. } => assert!(*transitioned),
        other => panic!("expected write-back failure, got {other:?}"),
    }
    assert_eq!(first.outcomes[0].target_name.as_deref(), Some("#5001"));
    let mutations_after_first = target.mutations();

    source.heal_writes();
    let second = engine.run_once();

    assert_eq!(target.mutations(), mutations_after_first);
    assert_eq!(second.outcomes[0].kind, OutcomeKind::Succeeded { transitioned: false });
    assert_eq!(source.writes(), vec![(SourceOrderId(1), TERMINAL)]);
}

// =============================================================================
// Tick-level behavior
// =============================================================================

#[test]
fn missing_credential_aborts_the_tick_quietly() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::default());
    let engine = reconciler_with(
        StaticCredentials(None),
        &source,
        &target,
        OverrideTable::default(),
    );

    let report = engine.run_once();

    assert_eq!(report.status, TickStatus::CredentialMissing);
    assert!(report.outcomes.is_empty());
    assert!(target.loads().is_empty());
}

#[test]
fn fetch_failure_is_reported_not_fatal() {
    let source = Arc::new(FakeSource::default());
    *source.list_error.lock().expect("list error") = Some(RemoteError::Http {
        system: RemoteSystem::Source,
        status: 401,
        body: "invalid_token".into(),
    });
    let target = Arc::new(FakeTarget::default());

    let report = reconciler(&source, &target).run_once();

    assert!(matches!(report.status, TickStatus::FetchFailed { .. }));
    assert_eq!(report.candidates, 0);
}

/// Source that parks inside `list_orders` until released.
struct GatedSource {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl SourceSystem for GatedSource {
    fn list_orders(
        &self,
        _token: &AccessToken,
        _status: StatusCode,
    ) -> Result<Vec<SourceOrder>, RemoteError> {
        let _ = self.entered.lock().expect("entered").send(());
        let _ = self.release.lock().expect("release").recv();
        Ok(Vec::new())
    }

    fn get_order(&self, _: &AccessToken, id: SourceOrderId) -> Result<SourceOrder, RemoteError> {
        Err(RemoteError::NotFound {
            system: RemoteSystem::Source,
            what: format!("order {id}"),
        })
    }

    fn write_status(&self, _: &AccessToken, _: SourceOrderId, _: StatusCode) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[test]
fn overlapping_tick_is_dropped() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let source = Arc::new(GatedSource {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let engine = Arc::new(Reconciler::new(
        Arc::new(StaticCredentials::authorized()),
        source,
        Arc::new(FakeTarget::default()),
        IdentifierResolver::new(Default::default(), OverrideTable::default()),
        EngineSettings {
            candidate_status: CANDIDATE,
            terminal_status: TERMINAL,
            store_id: None,
            marker_tag: MARKER.into(),
        },
    ));

    let running = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.run_once())
    };
    entered_rx.recv().expect("first tick entered");
    assert!(engine.is_running());

    let dropped = engine.run_once();
    assert_eq!(dropped.status, TickStatus::AlreadyRunning);

    release_tx.send(()).expect("release");
    let finished = running.join().expect("first tick");
    assert_eq!(finished.status, TickStatus::Completed);
    assert!(!engine.is_running());
}

// =============================================================================
// Operator surface
// =============================================================================

#[test]
fn single_order_run_skips_non_candidates() {
    let mut handled = source_order(1, Some("5001"));
    handled.status = TERMINAL;
    let source = Arc::new(FakeSource::with_orders([handled]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![open_pickup("fo-1", &[1])],
    )]));

    let report = pipeline::run(&reconciler(&source, &target), RunScope::Order(SourceOrderId(1)));

    assert_eq!(
        report.outcomes[0].kind,
        OutcomeKind::Skipped {
            reason: SkipReason::NotCandidate
        }
    );
    assert!(target.mutations().is_empty());
}

#[test]
fn single_order_run_reconciles_a_candidate() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![open_pickup("fo-1", &[1])],
    )]));

    let report = pipeline::run(&reconciler(&source, &target), RunScope::Order(SourceOrderId(1)));

    assert_eq!(report.candidates, 1);
    assert_eq!(report.outcomes[0].kind, OutcomeKind::Succeeded { transitioned: true });
}

#[test]
fn inspect_reports_the_plan_without_mutating() {
    let source = Arc::new(FakeSource::with_orders([source_order(1, Some("5001"))]));
    let target = Arc::new(FakeTarget::with_views([target_view(
        "5001",
        vec![
            open_pickup("fo-1", &[2]),
            fulfillment_order(
                "fo-2",
                FulfillmentOrderStatus::Open,
                DeliveryMethod::Shipping,
                &[1],
            ),
        ],
    )]));

    let inspection = reconciler(&source, &target)
        .inspect(SourceOrderId(1))
        .expect("inspect");

    assert!(inspection.candidate);
    assert_eq!(inspection.cross_reference_field, "numeroLoja");
    match inspection.target {
        TargetInspection::Loaded {
            marker_present,
            plan: OrderPlan::PerFulfillmentOrder { fulfillment_orders },
            ..
        } => {
            assert!(!marker_present);
            assert!(fulfillment_orders[0].action.is_mutation());
            assert!(matches!(
                fulfillment_orders[1].action,
                PlannedAction::NotPickup { .. }
            ));
        }
        other => panic!("expected loaded view, got {other:?}"),
    }
    assert!(target.mutations().is_empty());
    assert!(source.writes().is_empty());
}

#[test]
fn inspect_without_credential_is_an_error() {
    let source = Arc::new(FakeSource::default());
    let target = Arc::new(FakeTarget::default());
    let engine = reconciler_with(
        StaticCredentials(None),
        &source,
        &target,
        OverrideTable::default(),
    );

    let err = engine.inspect(SourceOrderId(1)).unwrap_err();
    assert!(matches!(err, RemoteError::CredentialMissing(RemoteSystem::Source)));
}
