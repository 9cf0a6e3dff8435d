use kubernetriks_cache::core::cache::cache::Cache;
use kubernetriks_cache::core::cache::handler::CacheHandlerBuilder;
use kubernetriks_cache::core::cache::snapshot::{new_empty_snapshot, Snapshot};
use kubernetriks_cache::core::common::ResourceName;
use kubernetriks_cache::core::pod::{Pod, PodResourceType};
use kubernetriks_cache::core::scheduler::cycle_state::CycleState;
use kubernetriks_cache::core::scheduler::interface::{ScheduleError, ScorePlugin};
use kubernetriks_cache::core::scheduler::load_aware::{LoadAware, LoadAwareArgs, ResourceSpec};
use kubernetriks_cache::test_util::helpers::{assigned, make_cnr, make_node, make_pod};

const NODE_CPU: u64 = 4000;
const NODE_RAM: u64 = 16 * (1 << 30);
const GI: u64 = 1 << 30;

// Pods are added before the nodes they are assigned to, nodes come with a CNR report.
fn make_snapshot(pods: Vec<Pod>) -> Snapshot {
    let _ = env_logger::try_init();

    let handler = CacheHandlerBuilder::new().build();
    let mut cache = Cache::new(handler.clone());
    for pod in pods.into_iter() {
        cache.add_pod(pod).unwrap();
    }
    for node_name in ["machine1", "machine2"] {
        cache.add_node(make_node(node_name, NODE_CPU, NODE_RAM, "")).unwrap();
        cache.add_cnr(make_cnr(node_name, NODE_CPU, NODE_RAM)).unwrap();
    }

    let mut snapshot = new_empty_snapshot(handler);
    cache.update_snapshot(&mut snapshot).unwrap();
    snapshot
}

fn score_machines(plugin: &LoadAware, snapshot: &Snapshot, pod: &Pod) -> Vec<i64> {
    let mut state = CycleState::new(snapshot);
    state.set_pod_resource_type(state.resolve_pod_resource_type(pod).unwrap());
    ["machine1", "machine2"]
        .iter()
        .map(|node_name| plugin.score(&state, pod, node_name).unwrap())
        .collect()
}

fn default_plugin() -> LoadAware {
    LoadAware::new(LoadAwareArgs::default()).unwrap()
}

fn placed_pods(resource_type: PodResourceType) -> Vec<Pod> {
    vec![
        assigned(make_pod("pod1", 1000, GI, resource_type), "machine1"),
        assigned(make_pod("pod2", 2000, 2 * GI, resource_type), "machine2"),
    ]
}

#[test]
fn test_nothing_scheduled_nothing_requested() {
    let snapshot = make_snapshot(vec![]);
    let pod = make_pod("pod", 0, 0, PodResourceType::BestEffort);

    assert_eq!(vec![97, 97], score_machines(&default_plugin(), &snapshot, &pod));
}

#[test]
fn test_best_effort_pods_of_different_size() {
    let snapshot = make_snapshot(placed_pods(PodResourceType::BestEffort));
    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);

    assert_eq!(vec![68, 53], score_machines(&default_plugin(), &snapshot, &pod));
}

#[test]
fn test_guaranteed_pods_are_ignored_for_best_effort_pod() {
    let snapshot = make_snapshot(placed_pods(PodResourceType::Guaranteed));
    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);

    assert_eq!(vec![84, 84], score_machines(&default_plugin(), &snapshot, &pod));
}

#[test]
fn test_scoring_is_deterministic() {
    let snapshot = make_snapshot(placed_pods(PodResourceType::BestEffort));
    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);
    let plugin = default_plugin();

    let first = score_machines(&plugin, &snapshot, &pod);
    for _ in 0..10 {
        assert_eq!(first, score_machines(&plugin, &snapshot, &pod));
    }
}

#[test]
fn test_specs_of_other_resource_type_do_not_change_score() {
    let snapshot = make_snapshot(placed_pods(PodResourceType::BestEffort));
    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);

    let mut args = LoadAwareArgs::default();
    args.resources.push(ResourceSpec {
        name: ResourceName::Cpu,
        weight: 10,
        resource_type: PodResourceType::Guaranteed,
    });
    let plugin = LoadAware::new(args).unwrap();

    assert_eq!(vec![68, 53], score_machines(&plugin, &snapshot, &pod));
}

#[test]
fn test_weighted_average_of_resource_scores() {
    let snapshot = make_snapshot(placed_pods(PodResourceType::BestEffort));
    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);

    let plugin = LoadAware::new(LoadAwareArgs {
        resources: vec![
            ResourceSpec {
                name: ResourceName::Cpu,
                weight: 3,
                resource_type: PodResourceType::BestEffort,
            },
            ResourceSpec {
                name: ResourceName::Memory,
                weight: 1,
                resource_type: PodResourceType::BestEffort,
            },
        ],
    })
    .unwrap();

    // machine1: cpu 50, memory 87; machine2: cpu 25, memory 81.
    assert_eq!(
        vec![(50 * 3 + 87) / 4, (25 * 3 + 81) / 4],
        score_machines(&plugin, &snapshot, &pod)
    );
}

#[test]
fn test_no_matching_specs_scores_zero() {
    let snapshot = make_snapshot(vec![]);
    let pod = make_pod("pod", 1000, GI, PodResourceType::Guaranteed);

    assert_eq!(vec![0, 0], score_machines(&default_plugin(), &snapshot, &pod));
}

#[test]
fn test_overcommitted_node_scores_zero() {
    let snapshot = make_snapshot(vec![assigned(
        make_pod("huge", 8000, 32 * GI, PodResourceType::BestEffort),
        "machine1",
    )]);
    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);

    assert_eq!(0, score_machines(&default_plugin(), &snapshot, &pod)[0]);
}

#[test]
fn test_zero_capacity_node_scores_zero() {
    let handler = CacheHandlerBuilder::new().build();
    let mut cache = Cache::new(handler.clone());
    cache.add_node(make_node("empty", 0, 0, "")).unwrap();
    let mut snapshot = new_empty_snapshot(handler);
    cache.update_snapshot(&mut snapshot).unwrap();

    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);
    let state = CycleState::new(&snapshot);
    assert_eq!(Ok(0), default_plugin().score(&state, &pod, "empty"));
}

#[test]
fn test_unclassified_pod_and_unknown_node() {
    let snapshot = make_snapshot(vec![]);
    let state = CycleState::new(&snapshot);
    let plugin = default_plugin();

    let unclassified = Pod::new("pod", 1000, GI);
    assert!(matches!(
        plugin.score(&state, &unclassified, "machine1"),
        Err(ScheduleError::UnknownPodResourceType { .. })
    ));

    let pod = make_pod("pod", 1000, GI, PodResourceType::BestEffort);
    assert!(matches!(
        plugin.score(&state, &pod, "machine3"),
        Err(ScheduleError::Cache(_))
    ));
}
