//! Algebraic laws of effect sets and stub overlay behaviour.

use calor_compiler::compiler::effects::{Effect, EffectKind, EffectSet, EffectsCatalog};
use calor_compiler::{compile, CompileOptions};
use std::sync::Arc;

fn samples() -> Vec<EffectSet> {
    vec![
        EffectSet::empty(),
        EffectSet::Unknown,
        EffectSet::from_codes(["cw"]),
        EffectSet::from_codes(["cw", "fr"]),
        EffectSet::from_codes(["net", "rand", "throw"]),
        EffectSet::from_codes(["mut", "alloc", "time"]),
    ]
}

#[test]
fn union_is_an_upper_bound() {
    for a in samples() {
        for b in samples() {
            let u = a.union(&b);
            assert!(a.is_subset_of(&u), "{} ⊄ {} ∪ {}", a, a, b);
            assert!(b.is_subset_of(&u), "{} ⊄ {} ∪ {}", b, a, b);
        }
    }
}

#[test]
fn unknown_absorbs_and_empty_is_identity() {
    for a in samples() {
        assert_eq!(a.union(&EffectSet::Unknown), EffectSet::Unknown);
        assert_eq!(EffectSet::Unknown.union(&a), EffectSet::Unknown);
        assert_eq!(EffectSet::empty().union(&a), a);
        assert_eq!(a.union(&EffectSet::empty()), a);
    }
}

#[test]
fn union_is_order_independent() {
    for a in samples() {
        for b in samples() {
            assert_eq!(a.union(&b), b.union(&a));
        }
    }
}

#[test]
fn subset_laws_for_unknown() {
    for a in samples() {
        assert!(a.is_subset_of(&EffectSet::Unknown));
        if a != EffectSet::Unknown {
            assert!(!EffectSet::Unknown.is_subset_of(&a), "Unknown ⊆ {}", a);
        }
    }
}

#[test]
fn equality_is_by_value() {
    let built = EffectSet::single(Effect::new(EffectKind::IO, "console_write"));
    assert_eq!(built, EffectSet::from_codes(["cw"]));
    assert_eq!(EffectSet::from_codes(["fr", "cw"]), EffectSet::from_codes(["cw", "fr", "cw"]));
}

#[test]
fn stub_overlay_feeds_inference() {
    let mut catalog = EffectsCatalog::builtin();
    let errors = catalog.load_stubs(
        r#"{"stubs": {
            "Acme.Mailer::Send(System.String)": ["net"],
            "Acme.Mailer::Bad(*)": ["warp"]
        }}"#,
    );
    assert_eq!(errors.len(), 1);
    let options = CompileOptions {
        catalog: Arc::new(catalog),
        catalog_errors: errors,
        verify_contracts: false,
        ..CompileOptions::default()
    };
    let src = "§M{m1:T} §F{f1:Notify} §E{net} §C{Acme.Mailer.Send} §A \"hi\" §/C §/F{f1} §/M{m1}";
    let out = compile(src, None, &options).expect("compiles");
    assert_eq!(out.effects["f1"], EffectSet::from_codes(["net"]));
    assert_eq!(out.diagnostics.with_code("E0304").count(), 1);
    assert_eq!(out.diagnostics.with_code("E0300").count(), 0);
}
