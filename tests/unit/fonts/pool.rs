use super::*;
use crate::fonts::resolver::{FontResolver, ResolvedFont};
use std::sync::Arc;
use std::time::Duration;

struct OnlyThese(Vec<String>);

impl FontResolver for OnlyThese {
    fn load(&self, family: &str) -> Option<ResolvedFont> {
        self.0.iter().any(|f| f == family).then(|| ResolvedFont {
            family: family.to_owned(),
            bytes: Arc::new(Vec::new()),
            index: 0,
        })
    }

    fn differs_from_fallback(&self, family: &str) -> bool {
        self.0.iter().any(|f| f == family)
    }
}

fn loader_for(names: &[&str]) -> FontLoader {
    FontLoader::with_timeout(
        Arc::new(OnlyThese(names.iter().map(|s| s.to_string()).collect())),
        Duration::from_millis(500),
    )
}

#[test]
fn normalize_collapses_whitespace() {
    assert_eq!(normalize_font_name("  Work \t  Sans \n"), "Work Sans");
    assert_eq!(normalize_font_name("   "), "");
}

#[test]
fn new_dedupes_after_normalizing() {
    let pool = FontPool::new(["Inter", " Inter ", "Roboto", "", "Ro  boto", "Roboto"]);
    assert_eq!(pool.names(), &["Inter", "Roboto", "Ro boto"]);
}

#[test]
fn effective_pads_only_up_to_two() {
    assert_eq!(FontPool::new(["OnlyOne"]).effective(), vec!["OnlyOne", "Inter"]);
    assert_eq!(FontPool::new(["Inter"]).effective(), vec!["Inter", "Roboto"]);
    assert_eq!(FontPool::default().effective(), vec!["Inter", "Roboto"]);

    let three = FontPool::new(["A", "B", "C"]);
    assert_eq!(three.effective(), three.names());
}

#[test]
fn add_remove_reorder_and_cap() {
    let mut pool = FontPool::new(["A", "B", "C", "D"]);
    assert!(!pool.add("A"));
    pool.reorder(0, 3);
    assert_eq!(pool.names(), &["B", "C", "D", "A"]);
    pool.reorder(9, 0);
    assert_eq!(pool.remove(1).as_deref(), Some("C"));
    assert_eq!(pool.remove(10), None);
    pool.clear();
    assert!(pool.is_empty());

    for i in 0..(MAX_SELECTED_FONTS + 5) {
        pool.add(&format!("F{i}"));
    }
    assert_eq!(pool.len(), MAX_SELECTED_FONTS);
}

#[test]
fn shuffle_is_deterministic_per_seed() {
    let mut a: Vec<u32> = (0..20).collect();
    let mut b = a.clone();
    ShuffleRng::new(7).shuffle(&mut a);
    ShuffleRng::new(7).shuffle(&mut b);
    assert_eq!(a, b);

    let mut sorted = a.clone();
    sorted.sort();
    assert_eq!(sorted, (0..20).collect::<Vec<_>>());
}

#[test]
fn randomize_keeps_verified_fonts_only_and_caps_size() {
    let usable: Vec<&str> = CURATED_FONTS.to_vec();
    let loader = loader_for(&usable);
    let pool = randomize_pool(&["Not Installed"], &loader, &mut ShuffleRng::new(42)).unwrap();
    assert_eq!(pool.len(), 8);
    assert!(pool.names().iter().all(|n| CURATED_FONTS.contains(&n.as_str())));
}

#[test]
fn randomize_keeps_two_verified_fonts_without_padding() {
    let loader = loader_for(&["Custom Face", "Lora"]);
    let pool = randomize_pool(&["Custom Face"], &loader, &mut ShuffleRng::new(1)).unwrap();
    let mut names = pool.names().to_vec();
    names.sort();
    assert_eq!(names, vec!["Custom Face", "Lora"]);
}

#[test]
fn randomize_fails_when_fewer_than_two_fonts_verify() {
    let loader = loader_for(&["Custom Face"]);
    let err = randomize_pool(&["Custom Face"], &loader, &mut ShuffleRng::new(1)).unwrap_err();
    assert!(matches!(err, TypeCutError::Font(_)), "{err}");
    assert!(err.to_string().contains("only 1 of"), "{err}");

    let nothing = loader_for(&[]);
    assert!(randomize_pool::<&str>(&[], &nothing, &mut ShuffleRng::new(1)).is_err());
}

#[test]
fn randomize_is_deterministic_per_seed() {
    let loader = loader_for(CURATED_FONTS);
    let a = randomize_pool::<&str>(&[], &loader, &mut ShuffleRng::new(9)).unwrap();
    let b = randomize_pool::<&str>(&[], &loader, &mut ShuffleRng::new(9)).unwrap();
    assert_eq!(a, b);
}
