// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Module scheduler cadence (§4.4) with real getters installed, beyond the
//! no-callback cases covered by `module.rs`'s own inline tests: installing a
//! getter switches the module to in-process mode, and each parameter's own
//! `pollinterval` governs when it comes due independent of the others'.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use secop_rs::node::{
    accessible::{Getter, Parameter, Reading},
    module::{AccessMode, Module},
};
use secop_rs::variant::Variant;
use serde_json::json;

fn counting_getter(counter: Arc<AtomicU64>) -> Getter {
    Arc::new(move || {
        let counter = counter.clone();
        Box::pin(async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Reading::now(Variant::double(n as f64, f64::NAN, f64::NAN)))
        })
    })
}

#[test]
fn installing_a_getter_selects_in_process_mode() {
    let mut m = Module::new("hpd").unwrap();
    let counter = Arc::new(AtomicU64::new(0));
    let mut p = Parameter::new("value", false, Some(counting_getter(counter)), None).unwrap();
    p.add_property("datainfo", json!({"type": "double"})).unwrap();
    p.add_property("pollinterval", json!(0.05)).unwrap();
    m.add_parameter(p).unwrap();

    m.finalize();
    assert_eq!(m.access_mode, AccessMode::InProcess);
    assert_eq!(m.actual_poll_ms, 50);
}

#[tokio::test]
async fn each_parameter_comes_due_on_its_own_interval() {
    let mut m = Module::new("hpd").unwrap();
    let fast_counter = Arc::new(AtomicU64::new(0));
    let mut fast = Parameter::new("fast", false, Some(counting_getter(fast_counter)), None).unwrap();
    fast.add_property("datainfo", json!({"type": "double"})).unwrap();
    fast.add_property("pollinterval", json!(0.01)).unwrap();
    m.add_parameter(fast).unwrap();

    let slow_counter = Arc::new(AtomicU64::new(0));
    let mut slow = Parameter::new("slow", false, Some(counting_getter(slow_counter)), None).unwrap();
    slow.add_property("datainfo", json!({"type": "double"})).unwrap();
    slow.add_property("pollinterval", json!(0.1)).unwrap();
    m.add_parameter(slow).unwrap();

    m.finalize();
    assert_eq!(m.actual_poll_ms, 10);

    // Five ticks of the module's own 10ms cadence: `fast` (10ms interval) is
    // due every tick, `slow` (100ms interval) only once the accumulator
    // crosses 100ms.
    let mut fast_due_count = 0;
    let mut slow_due_count = 0;
    for _ in 0..10 {
        for name in m.due_parameters(10) {
            match name.as_str() {
                "fast" => fast_due_count += 1,
                "slow" => slow_due_count += 1,
                other => panic!("unexpected due parameter: {other}"),
            }
        }
    }
    assert_eq!(fast_due_count, 10);
    assert_eq!(slow_due_count, 1);

    for name in ["fast", "slow"] {
        m.execute_read(name).await.unwrap();
    }
}

#[test]
fn zero_pollinterval_parameter_rides_the_module_wide_cadence() {
    let mut m = Module::new("hpd").unwrap();
    let counter = Arc::new(AtomicU64::new(0));
    let mut p = Parameter::new("value", false, Some(counting_getter(counter)), None).unwrap();
    p.add_property("datainfo", json!({"type": "double"})).unwrap();
    m.add_parameter(p).unwrap();
    m.finalize();

    // No parameter declared a pollinterval, so the module falls back to its
    // own wanted interval, clamped to the 1h ceiling.
    assert_eq!(m.actual_poll_ms, secop_rs::node::module::MAX_POLL_MS);
    assert!(m.due_parameters(secop_rs::node::module::MAX_POLL_MS).contains(&"value".to_string()));
}
