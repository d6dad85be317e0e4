//! EMF record vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use vector_loader::load;

#[test]
fn record_vectors() {
    let files = [
        "emf_single_metric.json",
        "emf_accumulated_values.json",
        "emf_unit_variant_name.json",
        "emf_unknown_unit_passthrough.json",
        "emf_unknown_unit_strict.json",
        "emf_no_metrics.json",
        "emf_missing_namespace.json",
        "emf_no_dimensions.json",
        "emf_too_many_dimensions.json",
        "emf_key_collision.json",
        "emf_blank_namespace.json",
    ];

    for f in files {
        let v = load(f);
        let res = v.run();

        if let Some(err) = &v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.kind().as_str(), err.code, "vector={}", v.description);
            if let Some(needle) = &err.message_contains {
                assert!(
                    e.to_string().contains(needle.as_str()),
                    "vector={} error={e}",
                    v.description
                );
            }
            continue;
        }

        let got = res.expect("expected ok record");
        let want = v.expect.as_ref().expect("missing expect block");
        assert_eq!(&got, want, "vector={}", v.description);
    }
}

#[test]
fn single_metric_vector_matches_end_to_end_shape() {
    let got = load("emf_single_metric.json").run().unwrap();
    assert_eq!(got["Count"], 1);
    assert_eq!(got["service"], "booking");
    assert_eq!(
        got["_aws"]["CloudWatchMetrics"][0]["Dimensions"],
        serde_json::json!([["service"]])
    );
}
