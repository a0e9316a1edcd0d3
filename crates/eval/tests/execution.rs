//! Execution-engine tests: loops, parallel regions, subtree and resource
//! calls, template expansion, and failure propagation.

use std::sync::Arc;

use sakura_core::{DataItem, DataMap, ErrorKind};
use sakura_eval::{
    Blossom, BlossomIO, BlossomSchema, BlossomStatus, FieldType, SakuraRuntime,
};

/// Accumulator: returns `acc + x` through the `acc` output.
struct AddBlossom {
    schema: BlossomSchema,
}

impl AddBlossom {
    fn new() -> Arc<Self> {
        let mut schema = BlossomSchema::new();
        schema.register_input("acc", FieldType::Int, true);
        schema.register_input("x", FieldType::Int, true);
        schema.register_output("acc", FieldType::Int);
        Arc::new(AddBlossom { schema })
    }
}

impl Blossom for AddBlossom {
    fn schema(&self) -> &BlossomSchema {
        &self.schema
    }

    fn run_task(
        &self,
        io: &mut BlossomIO,
        _context: &DataMap,
        _status: &mut BlossomStatus,
    ) -> Result<(), String> {
        let acc = int_input(io, "acc")?;
        let x = int_input(io, "x")?;
        io.output.insert("acc".to_string(), DataItem::Int(acc + x));
        Ok(())
    }
}

/// Writes its `value` input to the `y` output.
struct SetBlossom {
    schema: BlossomSchema,
}

impl SetBlossom {
    fn new() -> Arc<Self> {
        let mut schema = BlossomSchema::new();
        schema.register_input("value", FieldType::Int, true);
        schema.register_output("y", FieldType::Int);
        Arc::new(SetBlossom { schema })
    }
}

impl Blossom for SetBlossom {
    fn schema(&self) -> &BlossomSchema {
        &self.schema
    }

    fn run_task(
        &self,
        io: &mut BlossomIO,
        _context: &DataMap,
        _status: &mut BlossomStatus,
    ) -> Result<(), String> {
        let value = int_input(io, "value")?;
        io.output.insert("y".to_string(), DataItem::Int(value));
        Ok(())
    }
}

/// Echoes its string input through the `text` output.
struct EchoBlossom {
    schema: BlossomSchema,
}

impl EchoBlossom {
    fn new() -> Arc<Self> {
        let mut schema = BlossomSchema::new();
        schema.register_input("text", FieldType::String, true);
        schema.register_output("text", FieldType::String);
        Arc::new(EchoBlossom { schema })
    }
}

impl Blossom for EchoBlossom {
    fn schema(&self) -> &BlossomSchema {
        &self.schema
    }

    fn run_task(
        &self,
        io: &mut BlossomIO,
        _context: &DataMap,
        _status: &mut BlossomStatus,
    ) -> Result<(), String> {
        let text = io
            .input
            .get("text")
            .cloned()
            .ok_or_else(|| "text missing".to_string())?;
        io.output.insert("text".to_string(), text);
        Ok(())
    }
}

/// Always fails with a host-defined status code.
struct FailBlossom {
    schema: BlossomSchema,
}

impl FailBlossom {
    fn new() -> Arc<Self> {
        Arc::new(FailBlossom {
            schema: BlossomSchema::new(),
        })
    }
}

impl Blossom for FailBlossom {
    fn schema(&self) -> &BlossomSchema {
        &self.schema
    }

    fn run_task(
        &self,
        _io: &mut BlossomIO,
        _context: &DataMap,
        status: &mut BlossomStatus,
    ) -> Result<(), String> {
        status.status_code = 42;
        status.message = "handler gave up".to_string();
        Err("handler gave up".to_string())
    }
}

fn int_input(io: &BlossomIO, name: &str) -> Result<i64, String> {
    match io.input.get(name) {
        Some(DataItem::Int(value)) => Ok(*value),
        other => Err(format!("{name} is not an int: {other:?}")),
    }
}

fn runtime() -> SakuraRuntime {
    let runtime = SakuraRuntime::new(4);
    runtime.add_blossom("accum", "add", AddBlossom::new());
    runtime.add_blossom("special", "set", SetBlossom::new());
    runtime.add_blossom("special", "echo", EchoBlossom::new());
    runtime.add_blossom("special", "fail", FailBlossom::new());
    runtime
}

/// `foreach x in [1,2,3]: acc = add(acc, x)`, optionally parallel, with
/// optional post-aggregation values.
fn sum_tree(parallel: bool, post_aggregation: serde_json::Value) -> String {
    serde_json::json!({
        "kind": "tree",
        "id": "sum",
        "root_path": "root",
        "relative_path": "sum.sakura",
        "body": {
            "kind": "for_each",
            "temp_var_name": "x",
            "parallel": parallel,
            "iterate_array": { "item": [1, 2, 3] },
            "body": {
                "kind": "blossom_group",
                "id": "accumulate",
                "blossom_group_type": "accum",
                "blossoms": [
                    {
                        "blossom_type": "add",
                        "values": { "values": {
                            "acc": { "item": "acc", "io_type": "output" },
                            "x": { "item": "x", "is_identifier": true }
                        }}
                    }
                ]
            },
            "values": post_aggregation
        },
        "values": { "values": {
            "acc": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string()
}

#[test]
fn serial_foreach_accumulates() {
    let runtime = runtime();
    runtime
        .add_tree("sum", &sum_tree(false, serde_json::json!({})))
        .unwrap();

    let mut initial = DataMap::new();
    initial.insert("acc".to_string(), DataItem::Int(0));
    let result = runtime.trigger_tree("sum", initial, DataMap::new()).unwrap();

    assert_eq!(result.get("acc"), Some(&DataItem::Int(6)));
    // The loop variable does not leak into the parent scope.
    assert!(!result.contains_key("x"));
}

#[test]
fn parallel_foreach_keeps_iteration_scopes_private() {
    let runtime = runtime();
    runtime
        .add_tree("sum", &sum_tree(true, serde_json::json!({})))
        .unwrap();

    let mut initial = DataMap::new();
    initial.insert("acc".to_string(), DataItem::Int(0));
    let result = runtime.trigger_tree("sum", initial, DataMap::new()).unwrap();

    // Without post-aggregation, iteration writes stay in the workers.
    assert_eq!(result.get("acc"), Some(&DataItem::Int(0)));
    assert!(!result.contains_key("x"));
}

#[test]
fn parallel_foreach_post_aggregation_fills_per_child() {
    let runtime = runtime();
    let post = serde_json::json!({ "values": {
        "acc": { "item": "acc", "is_identifier": true }
    }});
    runtime.add_tree("sum", &sum_tree(true, post)).unwrap();

    let mut initial = DataMap::new();
    initial.insert("acc".to_string(), DataItem::Int(0));
    let result = runtime.trigger_tree("sum", initial, DataMap::new()).unwrap();

    // The aggregation map is filled against each child in enqueue order;
    // the identifier resolves on the first child (x = 1) and stays bound.
    assert_eq!(result.get("acc"), Some(&DataItem::Int(1)));
}

#[test]
fn serial_for_counts_the_range() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "count",
        "root_path": "root",
        "relative_path": "count.sakura",
        "body": {
            "kind": "for",
            "temp_var_name": "i",
            "parallel": false,
            "start": { "item": 2 },
            "end": { "item": 5 },
            "body": {
                "kind": "blossom_group",
                "id": "accumulate",
                "blossom_group_type": "accum",
                "blossoms": [
                    {
                        "blossom_type": "add",
                        "values": { "values": {
                            "acc": { "item": "acc", "io_type": "output" },
                            "x": { "item": "i", "is_identifier": true }
                        }}
                    }
                ]
            }
        },
        "values": { "values": {
            "acc": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("count", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("acc".to_string(), DataItem::Int(0));
    let result = runtime
        .trigger_tree("count", initial, DataMap::new())
        .unwrap();

    // 2 + 3 + 4
    assert_eq!(result.get("acc"), Some(&DataItem::Int(9)));
}

// Each branch runs on a full private copy of the parent scope, and the
// copies merge back with `All` in enqueue order once every branch is done.
// Later branches therefore take precedence for every key, including keys
// they never touched.
#[test]
fn parallel_branches_merge_back_in_enqueue_order() {
    let runtime = runtime();
    let left_branch = serde_json::json!({
        "kind": "blossom_group",
        "id": "set",
        "blossom_group_type": "special",
        "blossoms": [
            {
                "blossom_type": "set",
                "values": { "values": {
                    "value": { "item": 1 },
                    "left": { "item": "y", "io_type": "output" }
                }}
            }
        ]
    });
    let right_branch = serde_json::json!({
        "kind": "blossom_group",
        "id": "set",
        "blossom_group_type": "special",
        "blossoms": [
            {
                "blossom_type": "set",
                "values": { "values": {
                    "value": { "item": 2 },
                    "right": { "item": "y", "io_type": "output" }
                }}
            }
        ]
    });
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "fan-out",
        "root_path": "root",
        "relative_path": "fan_out.sakura",
        "body": {
            "kind": "parallel",
            "child": {
                "kind": "sequential",
                "children": [left_branch, right_branch]
            }
        },
        "values": { "values": {
            "left": { "item": 0, "io_type": "input" },
            "right": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("fan-out", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("left".to_string(), DataItem::Int(0));
    initial.insert("right".to_string(), DataItem::Int(0));
    let result = runtime
        .trigger_tree("fan-out", initial, DataMap::new())
        .unwrap();

    // The second branch's scope merges last: its write survives, and its
    // untouched copy of `left` wins over the first branch's write.
    assert_eq!(result.get("right"), Some(&DataItem::Int(2)));
    assert_eq!(result.get("left"), Some(&DataItem::Int(0)));
}

#[test]
fn failing_branch_surfaces_status_and_error() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "doomed",
        "root_path": "root",
        "relative_path": "doomed.sakura",
        "body": {
            "kind": "parallel",
            "child": {
                "kind": "sequential",
                "children": [
                    {
                        "kind": "blossom_group",
                        "id": "boom",
                        "blossom_group_type": "special",
                        "blossoms": [
                            { "blossom_type": "fail", "values": {} }
                        ]
                    },
                    {
                        "kind": "blossom_group",
                        "id": "fine",
                        "blossom_group_type": "special",
                        "blossoms": [
                            {
                                "blossom_type": "set",
                                "values": { "values": {
                                    "value": { "item": 7 },
                                    "slot": { "item": "y", "io_type": "output" }
                                }}
                            }
                        ]
                    }
                ]
            }
        },
        "values": { "values": {
            "slot": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("doomed", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("slot".to_string(), DataItem::Int(0));
    let failure = runtime
        .trigger_tree("doomed", initial, DataMap::new())
        .unwrap_err();

    // The handler's status travels up unchanged.
    assert_eq!(failure.status.status_code, 42);
    assert!(matches!(failure.error.kind, ErrorKind::Handler { .. }));
}

#[test]
fn subtree_call_passes_arguments_and_returns_outputs() {
    let runtime = runtime();

    let inner = serde_json::json!({
        "kind": "tree",
        "id": "inner",
        "root_path": "root",
        "relative_path": "inner.sakura",
        "body": {
            "kind": "blossom_group",
            "id": "compute",
            "blossom_group_type": "special",
            "blossoms": [
                {
                    "blossom_type": "set",
                    "values": { "values": {
                        "value": { "item": "val", "is_identifier": true },
                        "result": { "item": "y", "io_type": "output" }
                    }}
                }
            ]
        },
        "values": { "values": {
            "val": { "item": "{{}}", "io_type": "input" },
            "result": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("inner", &inner).unwrap();

    let outer = serde_json::json!({
        "kind": "tree",
        "id": "outer",
        "root_path": "root",
        "relative_path": "outer.sakura",
        "body": {
            "kind": "subtree",
            "name_or_path": "inner",
            "values": { "values": {
                "val": { "item": 5 },
                "final": { "item": "result", "io_type": "output" }
            }}
        },
        "values": { "values": {
            "final": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("outer", &outer).unwrap();

    let mut initial = DataMap::new();
    initial.insert("final".to_string(), DataItem::Int(0));
    let result = runtime
        .trigger_tree("outer", initial, DataMap::new())
        .unwrap();

    assert_eq!(result.get("final"), Some(&DataItem::Int(5)));
}

#[test]
fn missing_subtree_fails_at_run_time() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "dangling",
        "root_path": "root",
        "relative_path": "dangling.sakura",
        "body": {
            "kind": "subtree",
            "name_or_path": "nowhere",
            "values": {}
        }
    })
    .to_string();
    runtime.add_tree("dangling", &tree).unwrap();

    let failure = runtime
        .trigger_tree("dangling", DataMap::new(), DataMap::new())
        .unwrap_err();
    assert!(
        matches!(failure.error.kind, ErrorKind::MissingSubtree { ref name } if name == "nowhere")
    );
}

#[test]
fn resource_runs_as_subtree_from_a_blossom_group() {
    let runtime = runtime();

    let resource = serde_json::json!({
        "kind": "tree",
        "id": "make-seven",
        "root_path": "root",
        "relative_path": "make_seven.sakura",
        "body": {
            "kind": "blossom_group",
            "id": "make",
            "blossom_group_type": "special",
            "blossoms": [
                {
                    "blossom_type": "set",
                    "values": { "values": {
                        "value": { "item": 7 },
                        "target": { "item": "y", "io_type": "output" }
                    }}
                }
            ]
        },
        "values": { "values": {
            "target": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_resource("make-seven", &resource).unwrap();

    // The blossom-type resolves to the resource; the group's values are
    // the call arguments.
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "uses-resource",
        "root_path": "root",
        "relative_path": "uses_resource.sakura",
        "body": {
            "kind": "blossom_group",
            "id": "call",
            "blossom_group_type": "anything",
            "blossoms": [
                { "blossom_type": "make-seven", "values": {} }
            ],
            "values": { "values": {
                "seven": { "item": "target", "io_type": "output" }
            }}
        },
        "values": { "values": {
            "seven": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("uses-resource", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("seven".to_string(), DataItem::Int(0));
    let result = runtime
        .trigger_tree("uses-resource", initial, DataMap::new())
        .unwrap();

    assert_eq!(result.get("seven"), Some(&DataItem::Int(7)));
}

#[test]
fn string_values_are_template_expanded() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "greeting",
        "root_path": "root",
        "relative_path": "greeting.sakura",
        "body": {
            "kind": "blossom_group",
            "id": "greet {{ who }}",
            "blossom_group_type": "special",
            "blossoms": [
                {
                    "blossom_type": "echo",
                    "values": { "values": {
                        "text": { "item": "hello {{ who }}" },
                        "greeting": { "item": "text", "io_type": "output" }
                    }}
                }
            ]
        },
        "values": { "values": {
            "who": { "item": "{{}}", "io_type": "input" },
            "greeting": { "item": "", "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("greeting", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("who".to_string(), DataItem::String("world".into()));
    initial.insert("greeting".to_string(), DataItem::String(String::new()));
    let result = runtime
        .trigger_tree("greeting", initial, DataMap::new())
        .unwrap();

    assert_eq!(
        result.get("greeting"),
        Some(&DataItem::String("hello world".into()))
    );
}

#[test]
fn value_functions_run_inside_tree_calls() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "pick",
        "root_path": "root",
        "relative_path": "pick.sakura",
        "body": {
            "kind": "blossom_group",
            "id": "pick",
            "blossom_group_type": "accum",
            "blossoms": [
                {
                    "blossom_type": "add",
                    "values": { "values": {
                        "acc": { "item": "acc", "io_type": "output" },
                        "x": {
                            "item": "numbers",
                            "is_identifier": true,
                            "functions": [
                                { "name": "get", "args": [ { "item": 2 } ] }
                            ]
                        }
                    }}
                }
            ]
        },
        "values": { "values": {
            "acc": { "item": 0, "io_type": "input" },
            "numbers": { "item": [], "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("pick", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("acc".to_string(), DataItem::Int(0));
    initial.insert(
        "numbers".to_string(),
        DataItem::Array(vec![DataItem::Int(5), DataItem::Int(6), DataItem::Int(7)]),
    );
    let result = runtime
        .trigger_tree("pick", initial, DataMap::new())
        .unwrap();

    assert_eq!(result.get("acc"), Some(&DataItem::Int(7)));
}

#[test]
fn parallel_for_converges_over_the_whole_range() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "wide",
        "root_path": "root",
        "relative_path": "wide.sakura",
        "body": {
            "kind": "for",
            "temp_var_name": "i",
            "parallel": true,
            "start": { "item": 0 },
            "end": { "item": 8 },
            "body": {
                "kind": "blossom_group",
                "id": "step",
                "blossom_group_type": "accum",
                "blossoms": [
                    {
                        "blossom_type": "add",
                        "values": { "values": {
                            "acc": { "item": "acc", "io_type": "output" },
                            "x": { "item": "i", "is_identifier": true }
                        }}
                    }
                ]
            }
        },
        "values": { "values": {
            "acc": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("wide", &tree).unwrap();

    // More iterations than workers: the barrier still releases, and the
    // parent scope stays isolated from the iteration scopes.
    let mut initial = DataMap::new();
    initial.insert("acc".to_string(), DataItem::Int(0));
    let result = runtime
        .trigger_tree("wide", initial, DataMap::new())
        .unwrap();
    assert_eq!(result.get("acc"), Some(&DataItem::Int(0)));
}

#[test]
fn sequential_aborts_on_first_failure() {
    let runtime = runtime();
    let tree = serde_json::json!({
        "kind": "tree",
        "id": "short-circuit",
        "root_path": "root",
        "relative_path": "short_circuit.sakura",
        "body": {
            "kind": "sequential",
            "children": [
                {
                    "kind": "blossom_group",
                    "id": "boom",
                    "blossom_group_type": "special",
                    "blossoms": [
                        { "blossom_type": "fail", "values": {} }
                    ]
                },
                {
                    "kind": "blossom_group",
                    "id": "never",
                    "blossom_group_type": "special",
                    "blossoms": [
                        {
                            "blossom_type": "set",
                            "values": { "values": {
                                "value": { "item": 1 },
                                "ran": { "item": "y", "io_type": "output" }
                            }}
                        }
                    ]
                }
            ]
        },
        "values": { "values": {
            "ran": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("short-circuit", &tree).unwrap();

    let mut initial = DataMap::new();
    initial.insert("ran".to_string(), DataItem::Int(0));
    let failure = runtime
        .trigger_tree("short-circuit", initial, DataMap::new())
        .unwrap_err();
    assert_eq!(failure.status.status_code, 42);
    assert!(matches!(failure.error.kind, ErrorKind::Handler { .. }));
}

#[test]
fn context_is_visible_to_handlers() {
    struct ContextProbe {
        schema: BlossomSchema,
    }
    impl Blossom for ContextProbe {
        fn schema(&self) -> &BlossomSchema {
            &self.schema
        }
        fn run_task(
            &self,
            io: &mut BlossomIO,
            context: &DataMap,
            _status: &mut BlossomStatus,
        ) -> Result<(), String> {
            let value = context
                .get("marker")
                .cloned()
                .ok_or_else(|| "context marker missing".to_string())?;
            io.output.insert("y".to_string(), value);
            Ok(())
        }
    }

    let runtime = runtime();
    let mut schema = BlossomSchema::new();
    schema.register_output("y", FieldType::Int);
    runtime.add_blossom("special", "probe", Arc::new(ContextProbe { schema }));

    let tree = serde_json::json!({
        "kind": "tree",
        "id": "probing",
        "root_path": "root",
        "relative_path": "probing.sakura",
        "body": {
            "kind": "blossom_group",
            "id": "probe",
            "blossom_group_type": "special",
            "blossoms": [
                {
                    "blossom_type": "probe",
                    "values": { "values": {
                        "seen": { "item": "y", "io_type": "output" }
                    }}
                }
            ]
        },
        "values": { "values": {
            "seen": { "item": 0, "io_type": "input" }
        }}
    })
    .to_string();
    runtime.add_tree("probing", &tree).unwrap();

    let mut context = DataMap::new();
    context.insert("marker".to_string(), DataItem::Int(99));
    let mut initial = DataMap::new();
    initial.insert("seen".to_string(), DataItem::Int(0));
    let result = runtime.trigger_tree("probing", initial, context).unwrap();

    assert_eq!(result.get("seen"), Some(&DataItem::Int(99)));
}
