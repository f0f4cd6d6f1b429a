//! End-to-end behavior of the model graph.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use kiln_lib::model::{LifecycleState, ModelError, ModelGraph, ModelPath, ModelReference, PathError, TypeToken};

use super::common::path;

#[derive(Debug, Clone, PartialEq)]
struct CompileOptions {
  optimize: bool,
  defines: Vec<String>,
}

mod paths {
  use super::*;

  #[test]
  fn child_then_parent_round_trips() {
    for p in [ModelPath::root(), path("a"), path("tasks.compile")] {
      let child = p.child("options").unwrap();
      assert_eq!(child.parent().unwrap(), p);
    }
  }

  #[test]
  fn root_has_no_parent() {
    assert!(matches!(ModelPath::root().parent(), Err(PathError::InvalidPath { .. })));
  }

  #[test]
  fn invalid_segments_are_rejected() {
    assert!(matches!(path("a").child(""), Err(PathError::InvalidSegment { .. })));
    assert!(matches!(path("a").child("x.y"), Err(PathError::InvalidSegment { .. })));
  }
}

mod references {
  use super::*;

  #[test]
  fn unchanged_derivations_are_the_same_instance() {
    let r = ModelReference::of_state(path("compileOptions"), TypeToken::of::<CompileOptions>(), LifecycleState::Mutated);
    let same_path = r.with_path(r.path().unwrap().clone());
    assert!(same_path.same_instance(&r));
    assert!(r.at_state(r.state()).same_instance(&r));
  }
}

mod realization {
  use super::*;

  fn options_reference(state: LifecycleState) -> ModelReference {
    ModelReference::of_state(path("compileOptions"), TypeToken::of::<CompileOptions>(), state)
  }

  #[test]
  fn five_threads_share_one_rule_invocation() {
    let graph = ModelGraph::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    graph
      .register(
        path("compileOptions"),
        TypeToken::of::<CompileOptions>(),
        LifecycleState::Initialized,
        move |ctx| {
          counter.fetch_add(1, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(25));
          ctx.set_value(CompileOptions {
            optimize: true,
            defines: vec!["NDEBUG".into()],
          })
        },
      )
      .unwrap();

    let reference = options_reference(LifecycleState::Initialized);
    let barrier = Barrier::new(5);
    let values: Vec<Arc<CompileOptions>> = thread::scope(|scope| {
      let handles: Vec<_> = (0..5)
        .map(|_| {
          scope.spawn(|| {
            barrier.wait();
            graph.resolve::<CompileOptions>(&reference).unwrap()
          })
        })
        .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for value in &values {
      assert!(Arc::ptr_eq(value, &values[0]));
      assert!(value.optimize);
    }
  }

  #[test]
  fn state_never_regresses_under_concurrent_requests() {
    let graph = ModelGraph::new();
    let token = TypeToken::of::<CompileOptions>();
    graph
      .register(path("compileOptions"), token.clone(), LifecycleState::Initialized, |ctx| {
        ctx.set_value(CompileOptions {
          optimize: false,
          defines: Vec::new(),
        })
      })
      .unwrap();
    for state in [LifecycleState::Mutated, LifecycleState::Finalized, LifecycleState::GraphClosed] {
      graph
        .register(path("compileOptions"), token.clone(), state, move |ctx| {
          thread::sleep(Duration::from_millis(5));
          ctx.mutate::<CompileOptions, _>(|o| o.defines.push(format!("{}", state)))
        })
        .unwrap();
    }

    let done = AtomicBool::new(false);
    thread::scope(|scope| {
      let observer = scope.spawn(|| {
        let mut last = LifecycleState::Known;
        while !done.load(Ordering::SeqCst) {
          if let Some(state) = graph.state_of(&path("compileOptions")) {
            assert!(state >= last, "state went from {} to {}", last, state);
            last = state;
          }
        }
      });

      let targets = [
        LifecycleState::GraphClosed,
        LifecycleState::Initialized,
        LifecycleState::Finalized,
        LifecycleState::Mutated,
      ];
      let workers: Vec<_> = targets
        .into_iter()
        .map(|target| {
          let graph = &graph;
          scope.spawn(move || graph.resolve_node(&options_reference(target)).unwrap())
        })
        .collect();
      for worker in workers {
        let view = worker.join().unwrap();
        assert!(view.has_value);
      }
      done.store(true, Ordering::SeqCst);
      observer.join().unwrap();
    });

    let value = graph
      .resolve::<CompileOptions>(&options_reference(LifecycleState::GraphClosed))
      .unwrap();
    assert_eq!(value.defines, vec!["Mutated", "Finalized", "GraphClosed"]);
  }

  #[test]
  fn transitive_cycle_is_reported_with_stack() {
    let graph = ModelGraph::new();
    graph
      .register(path("a"), TypeToken::UNTYPED, LifecycleState::Initialized, |ctx| {
        ctx.resolve_node(&ModelReference::of_path(path("b")).at_state(LifecycleState::Initialized))?;
        ctx.set_value(1u8)
      })
      .unwrap();
    graph
      .register(path("b"), TypeToken::UNTYPED, LifecycleState::Initialized, |ctx| {
        ctx.resolve_node(&ModelReference::of_path(path("a")).at_state(LifecycleState::Initialized))?;
        ctx.set_value(2u8)
      })
      .unwrap();

    let err = graph
      .resolve_node(&ModelReference::of_path(path("a")).at_state(LifecycleState::Initialized))
      .unwrap_err();
    match &err {
      ModelError::CyclicReference { stack, .. } => {
        assert_eq!(stack, &["a@Initialized", "b@Initialized", "a@Initialized"]);
      }
      other => panic!("expected a cycle, got {other}"),
    }
    assert!(err.to_string().contains("a@Initialized -> b@Initialized -> a@Initialized"));
  }

  #[test]
  fn rules_resolve_their_inputs() {
    let graph = ModelGraph::new();
    graph
      .register(path("toolchain.version"), TypeToken::of::<String>(), LifecycleState::Initialized, |ctx| {
        ctx.set_value("17".to_string())
      })
      .unwrap();
    graph
      .register(
        path("compileOptions"),
        TypeToken::of::<CompileOptions>(),
        LifecycleState::Initialized,
        |ctx| {
          let version = ctx.resolve::<String>(
            &ModelReference::to_value::<String>("toolchain.version")?.at_state(LifecycleState::Initialized),
          )?;
          ctx.set_value(CompileOptions {
            optimize: true,
            defines: vec![format!("JAVA_VERSION={}", version)],
          })
        },
      )
      .unwrap();

    let value = graph
      .resolve::<CompileOptions>(&options_reference(LifecycleState::Initialized))
      .unwrap();
    assert_eq!(value.defines, vec!["JAVA_VERSION=17"]);
    assert_eq!(graph.state_of(&path("toolchain.version")), Some(LifecycleState::Initialized));
  }

  #[test]
  fn failures_name_the_path_and_type() {
    let graph = ModelGraph::new();
    graph
      .register(path("compileOptions"), TypeToken::of::<CompileOptions>(), LifecycleState::Initialized, |ctx| {
        ctx.set_value(CompileOptions {
          optimize: false,
          defines: Vec::new(),
        })
      })
      .unwrap();

    let unknown = graph
      .resolve_node(&ModelReference::of_type(TypeToken::of::<String>()))
      .unwrap_err();
    assert!(matches!(unknown, ModelError::UnknownModelElement { .. }));
    assert!(unknown.to_string().contains("String"));

    let mismatch = graph
      .resolve_node(&ModelReference::of_state(
        path("compileOptions"),
        TypeToken::of::<u64>(),
        LifecycleState::Initialized,
      ))
      .unwrap_err();
    assert!(mismatch.to_string().contains("compileOptions"));

    let unrealizable = graph.resolve_node(&options_reference(LifecycleState::Finalized)).unwrap_err();
    assert!(matches!(
      unrealizable,
      ModelError::UnrealizableState {
        ceiling: LifecycleState::Initialized,
        ..
      }
    ));
  }

  #[test]
  fn graph_lists_registered_paths() {
    let graph = ModelGraph::new();
    for name in ["b", "a.c", "a"] {
      graph
        .register(path(name), TypeToken::UNTYPED, LifecycleState::Registered, |_| Ok(()))
        .unwrap();
    }
    assert_eq!(graph.paths(), vec![path("a"), path("a.c"), path("b")]);
    assert!(graph.node(&path("a")).is_none());

    let view = graph
      .resolve_node(&ModelReference::of_path(path("a")).at_state(LifecycleState::Registered))
      .unwrap();
    assert_eq!(view.state, LifecycleState::Registered);
    assert!(!view.has_value);
  }
}
