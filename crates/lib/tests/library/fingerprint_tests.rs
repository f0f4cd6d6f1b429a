//! Determinism, sensitivity and visitation order of fingerprints.

use std::fs;

use kiln_lib::config::EngineConfig;
use kiln_lib::fingerprint::{
  AbortSignal, FileInput, FingerprintError, InputValue, Normalization, PathSensitivity, VisitEvent, fingerprint,
  fingerprint_units,
};
use tempfile::TempDir;

use super::common::{compile_unit, write_files};

fn config() -> EngineConfig {
  EngineConfig::default()
}

fn two_dirs(temp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
  write_files(
    temp.path(),
    &[("dirA/2.txt", "two"), ("dirA/1.txt", "one"), ("dirB/x.txt", "x")],
  );
  (temp.path().join("dirA"), temp.path().join("dirB"))
}

mod determinism {
  use super::*;

  #[test]
  fn identical_inputs_produce_identical_hashes() {
    let temp = TempDir::new().unwrap();
    let (dir_a, dir_b) = two_dirs(&temp);
    let unit = compile_unit(FileInput::new([&dir_b, &dir_a]));

    let first = fingerprint(&unit, &config());
    let second = fingerprint(&unit, &config());
    assert!(first.hash.is_some());
    assert_eq!(first.hash, second.hash);
    assert_eq!(first.visit_events(), second.visit_events());
  }

  #[test]
  fn identical_trees_in_different_places_match_under_relative_paths() {
    let one = TempDir::new().unwrap();
    let two = TempDir::new().unwrap();
    for temp in [&one, &two] {
      write_files(temp.path(), &[("src/main.c", "int main() {}"), ("src/util/str.c", "/* */")]);
    }
    let relative = Normalization::new(PathSensitivity::Relative);

    let a = fingerprint(
      &compile_unit(FileInput::new([one.path().join("src")]).with_normalization(relative)),
      &config(),
    );
    let b = fingerprint(
      &compile_unit(FileInput::new([two.path().join("src")]).with_normalization(relative)),
      &config(),
    );
    assert_eq!(a.hash, b.hash);
  }

  #[test]
  fn parallelism_does_not_change_results() {
    let temp = TempDir::new().unwrap();
    let (dir_a, dir_b) = two_dirs(&temp);
    let units: Vec<_> = (0..6)
      .map(|i| compile_unit(FileInput::new([&dir_a, &dir_b])).with_input("index", i as i64))
      .collect();

    let serial = fingerprint_units(&units, &config().with_parallelism(1), &AbortSignal::new());
    let parallel = fingerprint_units(&units, &config().with_parallelism(4), &AbortSignal::new());
    assert_eq!(serial, parallel);
  }
}

mod sensitivity {
  use super::*;

  #[test]
  fn scalar_value_change() {
    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);
    let base = compile_unit(FileInput::new([&dir_a]));

    let before = fingerprint(&base, &config());
    let after = fingerprint(&base.clone().with_input("target", "aarch64"), &config());
    assert_ne!(before.hash, after.hash);
    assert_eq!(before.file_properties, after.file_properties);
  }

  #[test]
  fn single_byte_change() {
    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);
    let unit = compile_unit(FileInput::new([&dir_a]));

    let before = fingerprint(&unit, &config());
    fs::write(dir_a.join("2.txt"), b"twO").unwrap();
    let after = fingerprint(&unit, &config());
    assert_ne!(before.hash, after.hash);
  }

  #[test]
  fn root_order() {
    let temp = TempDir::new().unwrap();
    let (dir_a, dir_b) = two_dirs(&temp);

    let ab = fingerprint(&compile_unit(FileInput::new([&dir_a, &dir_b])), &config());
    let ba = fingerprint(&compile_unit(FileInput::new([&dir_b, &dir_a])), &config());
    assert_ne!(ab.hash, ba.hash);
  }

  #[test]
  fn normalization_choice() {
    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);

    let hashes: Vec<_> = [
      Normalization::new(PathSensitivity::Absolute),
      Normalization::new(PathSensitivity::Relative),
      Normalization::new(PathSensitivity::NameOnly),
      Normalization::new(PathSensitivity::Ignored),
      Normalization::new(PathSensitivity::Relative).normalizing_line_endings(),
      Normalization::new(PathSensitivity::Relative).ignoring_directories(),
    ]
    .into_iter()
    .map(|n| fingerprint(&compile_unit(FileInput::new([&dir_a]).with_normalization(n)), &config()).hash)
    .collect();

    for (i, a) in hashes.iter().enumerate() {
      assert!(a.is_some());
      for b in &hashes[i + 1..] {
        assert_ne!(a, b);
      }
    }
  }
}

mod absence {
  use super::*;

  #[test]
  fn one_missing_root_makes_the_fingerprint_absent() {
    let temp = TempDir::new().unwrap();
    let (dir_a, dir_b) = two_dirs(&temp);
    let unit = compile_unit(FileInput::new([dir_a, temp.path().join("missing"), dir_b]));

    let fp = fingerprint(&unit, &config());
    assert_eq!(fp.hash, None);
    assert!(fp.file_properties.is_empty());
    assert!(fp.input_hashes.is_empty());
    assert!(fp.visit_events().is_empty());
    assert!(matches!(
      fp.unavailable,
      Some(FingerprintError::MissingRoot { ref property, .. }) if property == "sources"
    ));
    // Identities and outputs are still reported.
    assert_eq!(fp.action_names, vec!["CompileAction".to_string()]);
    assert_eq!(fp.output_names, vec!["objects".to_string()]);
  }

  #[test]
  fn invalid_scalar_alongside_valid_files() {
    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);
    let unit = compile_unit(FileInput::new([dir_a])).with_input("flags", InputValue::Invalid("unsupported type".into()));

    let fp = fingerprint(&unit, &config());
    assert!(!fp.is_available());
    assert!(
      fp.unavailable
        .as_ref()
        .is_some_and(|e| e.to_string().contains("unsupported type"))
    );
  }

  #[cfg(unix)]
  #[test]
  fn unreadable_file_makes_the_fingerprint_absent() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);
    let secret = dir_a.join("1.txt");
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
    // Privileged users can read anything; nothing to check then.
    if fs::read(&secret).is_ok() {
      return;
    }

    let fp = fingerprint(&compile_unit(FileInput::new([&dir_a])), &config());
    assert!(matches!(fp.unavailable, Some(FingerprintError::ReadFile { .. })));
  }
}

mod visitation {
  use super::*;

  fn shape(events: &[VisitEvent]) -> Vec<String> {
    events
      .iter()
      .map(|event| match event {
        VisitEvent::PreProperty { name, .. } => format!("pre-property {}", name),
        VisitEvent::PreRoot { name, .. } => format!("pre-root {}", name),
        VisitEvent::PreDirectory { name, .. } => format!("pre-directory {}", name),
        VisitEvent::File { name, .. } => format!("file {}", name),
        VisitEvent::PostDirectory => "post-directory".to_string(),
        VisitEvent::PostRoot => "post-root".to_string(),
        VisitEvent::PostProperty => "post-property".to_string(),
      })
      .collect()
  }

  #[test]
  fn roots_keep_declared_order_and_entries_are_sorted() {
    let temp = TempDir::new().unwrap();
    let (dir_a, dir_b) = two_dirs(&temp);
    let fp = fingerprint(&compile_unit(FileInput::new([&dir_b, &dir_a])), &config());

    assert_eq!(
      shape(&fp.visit_events()),
      vec![
        "pre-property sources",
        "pre-root dirB",
        "pre-directory dirB",
        "file x.txt",
        "post-directory",
        "post-root",
        "pre-root dirA",
        "pre-directory dirA",
        "file 1.txt",
        "file 2.txt",
        "post-directory",
        "post-root",
        "post-property",
      ]
    );
  }

  #[test]
  fn properties_are_visited_by_name() {
    let temp = TempDir::new().unwrap();
    let (dir_a, dir_b) = two_dirs(&temp);
    let unit = compile_unit(FileInput::new([&dir_a]))
      .with_files("headers", FileInput::new([dir_b.join("x.txt")]))
      .with_files("zlib", FileInput::new([&dir_b]));

    let events = fingerprint(&unit, &config()).visit_events();
    let properties: Vec<_> = events
      .iter()
      .filter_map(|e| match e {
        VisitEvent::PreProperty { name, .. } => Some(name.as_str()),
        _ => None,
      })
      .collect();
    assert_eq!(properties, vec!["headers", "sources", "zlib"]);

    let headers = shape(&events[..5]);
    assert_eq!(
      headers,
      vec!["pre-property headers", "pre-root x.txt", "file x.txt", "post-root", "post-property"]
    );
  }

  #[test]
  fn pre_property_reports_normalization() {
    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);
    let unit = compile_unit(FileInput::new([&dir_a]).with_normalization(Normalization::new(PathSensitivity::NameOnly)));
    let fp = fingerprint(&unit, &config());

    match &fp.visit_events()[0] {
      VisitEvent::PreProperty {
        hash,
        strategy,
        attributes,
        ..
      } => {
        assert_eq!(strategy, "NAME_ONLY");
        assert!(attributes.contains(&"FINGERPRINTING_STRATEGY_NAME_ONLY".to_string()));
        assert_eq!(Some(hash), fp.file_properties.get("sources").map(|p| &p.hash));
      }
      other => panic!("expected pre-property, got {other}"),
    }
  }

  #[test]
  fn file_events_carry_absolute_paths() {
    let temp = TempDir::new().unwrap();
    let (dir_a, _) = two_dirs(&temp);
    let fp = fingerprint(&compile_unit(FileInput::new([&dir_a])), &config());

    let files: Vec<_> = fp
      .visit_events()
      .into_iter()
      .filter_map(|e| match e {
        VisitEvent::File { path, .. } => Some(path),
        _ => None,
      })
      .collect();
    assert_eq!(
      files,
      vec![
        dir_a.join("1.txt").display().to_string(),
        dir_a.join("2.txt").display().to_string()
      ]
    );
  }
}
