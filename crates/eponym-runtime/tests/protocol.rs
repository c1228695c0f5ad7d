//! End-to-end tests of the host↔guest calling protocol: component counts,
//! length caps, leak-freedom, and serialization of concurrent callers.

use std::collections::HashSet;
use std::thread;

use eponym_runtime::{NameModule, NameOptions, RuntimeError};

fn opts(components: u8, max_element_length: u32, separator: &str) -> NameOptions {
    NameOptions {
        components,
        max_element_length,
        separator: separator.to_string(),
    }
}

#[test]
fn every_valid_component_count_yields_that_many_segments() {
    let module = NameModule::new().expect("init");
    for components in 2..=16u8 {
        let name = module
            .generate_with_options(&opts(components, 0, "-"))
            .expect("generate");
        let segments: Vec<&str> = name.split('-').collect();
        assert_eq!(segments.len(), components as usize, "{name}");
        assert!(segments.iter().all(|s| !s.is_empty()), "{name}");
    }
}

#[test]
fn max_element_length_caps_every_segment() {
    let module = NameModule::new().expect("init");
    for max_len in [3u32, 4, 6, 10] {
        for _ in 0..20 {
            let name = module
                .generate_with_options(&opts(5, max_len, "-"))
                .expect("generate");
            for segment in name.split('-') {
                assert!(
                    !segment.is_empty() && segment.len() <= max_len as usize,
                    "segment '{segment}' of '{name}' exceeds {max_len} bytes"
                );
            }
        }
    }
}

#[test]
fn repeated_calls_vary() {
    let module = NameModule::new().expect("init");
    let names: HashSet<String> = (0..10).map(|_| module.generate().expect("generate")).collect();
    assert!(names.len() > 1, "10 calls produced a single name: {names:?}");
}

#[test]
fn multi_byte_separator_is_carried_verbatim() {
    let module = NameModule::new().expect("init");
    let name = module
        .generate_with_options(&opts(3, 0, "::"))
        .expect("generate");
    assert_eq!(name.split("::").count(), 3, "{name}");
}

#[test]
fn long_separators_never_swallow_segments() {
    let module = NameModule::new().expect("init");
    // 15 copies of a 64-byte separator blow well past the word budget;
    // the output buffer must stretch to fit every requested segment.
    let sep = "=".repeat(64);
    let name = module
        .generate_with_options(&opts(16, 0, &sep))
        .expect("generate");
    let segments: Vec<&str> = name.split(sep.as_str()).collect();
    assert_eq!(segments.len(), 16, "{name}");
    assert!(segments.iter().all(|s| !s.is_empty()), "{name}");
    let (allocs, frees) = module.allocation_stats();
    assert_eq!(allocs, frees);
}

#[test]
fn worked_examples() {
    let module = NameModule::new().expect("init");

    // generate({components:3, maxElementLength:0, separator:"-"})
    let name = module
        .generate_with_options(&opts(3, 0, "-"))
        .expect("generate");
    let parts: Vec<&str> = name.split('-').collect();
    assert_eq!(parts.len(), 3, "{name}");
    assert!(parts.iter().all(|p| !p.is_empty()), "{name}");

    // generate({components:2, maxElementLength:4, separator:"_"})
    let name = module
        .generate_with_options(&opts(2, 4, "_"))
        .expect("generate");
    let parts: Vec<&str> = name.split('_').collect();
    assert_eq!(parts.len(), 2, "{name}");
    assert!(parts.iter().all(|p| !p.is_empty() && p.len() <= 4), "{name}");
}

#[test]
fn every_allocation_is_returned_to_the_guest() {
    let module = NameModule::new().expect("init");
    for _ in 0..200 {
        module
            .generate_with_options(&opts(4, 5, "."))
            .expect("generate");
    }
    let (allocs, frees) = module.allocation_stats();
    // one separator buffer and one output buffer per call
    assert_eq!(allocs, 400);
    assert_eq!(frees, allocs, "guest memory leaked");
}

#[test]
fn rejected_options_touch_no_guest_memory() {
    let module = NameModule::new().expect("init");
    let err = module
        .generate_with_options(&opts(1, 0, "-"))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidOptions(_)), "{err}");
    assert_eq!(module.allocation_stats(), (0, 0));
}

#[test]
fn version_is_nonempty_and_stable() {
    let module = NameModule::new().expect("init");
    let first = module.version().expect("version");
    assert!(!first.is_empty());
    for _ in 0..5 {
        assert_eq!(module.version().expect("version"), first);
    }
    // read-only query: no transient buffers involved
    assert_eq!(module.allocation_stats(), (0, 0));
}

#[test]
fn fifty_concurrent_callers_are_serialized_cleanly() {
    let handles: Vec<_> = (0..50)
        .map(|i| {
            thread::spawn(move || {
                let requested = 2 + (i % 15) as u8;
                let name = eponym_runtime::generate_with_options(&opts(requested, 0, "-"))
                    .expect("generate");
                (requested, name)
            })
        })
        .collect();

    for handle in handles {
        let (requested, name) = handle.join().expect("worker panicked");
        assert_eq!(
            name.split('-').count(),
            requested as usize,
            "corrupted result: {name}"
        );
    }

    let (allocs, frees) = NameModule::shared().expect("shared").allocation_stats();
    assert_eq!(allocs, frees, "guest memory leaked under contention");
}
