//! Tests for tree rendering: limits, fault containment, output formats and
//! snapshot files

mod common;

use std::cell::RefCell;

use common::Harness;
use vista_core::prelude::*;
use vista_core::render::ELIDED_LABEL;

fn summaries(tree: &ValueTree) -> Vec<Option<&str>>
{
    tree.children.iter().map(|child| child.summary.as_deref()).collect()
}

#[test]
fn test_children_beyond_limit_are_elided()
{
    let mut h = Harness::new();
    let vector = h.int_vector(&[1, 2, 3, 4, 5], 0);
    h.limits.max_children = 3;
    let session = h.session();

    let tree = render(session, "v", vector);
    assert_eq!(tree.children.len(), 4);
    assert_eq!(tree.children[2].summary.as_deref(), Some("3"));
    let marker = &tree.children[3];
    assert_eq!(marker.label, ELIDED_LABEL);
    assert_eq!(marker.summary.as_deref(), Some("more than 3 children"));
}

#[test]
fn test_exact_limit_has_no_marker()
{
    let mut h = Harness::new();
    let vector = h.int_vector(&[1, 2, 3], 0);
    h.limits.max_children = 3;
    let session = h.session();

    let tree = render(session, "v", vector);
    assert_eq!(summaries(&tree), [Some("1"), Some("2"), Some("3")]);
}

#[test]
fn test_depth_limit_keeps_summary()
{
    let mut h = Harness::new();
    let vector = h.int_vector(&[8, 9], 0);
    let holder_ty = StructBuilder::new("holder")
        .field("items", vector.type_id())
        .finish(h.types())
        .unwrap();
    let holder = vector.cast(holder_ty);
    h.limits.max_depth = 1;
    let session = h.session();

    let tree = render(session, "holder", holder);
    let items = tree.child("items").unwrap();
    assert_eq!(items.summary.as_deref(), Some("std::vector of size 2, capacity 2"));
    assert_eq!(items.hint, DisplayHint::Sequence);
    assert!(items.children.is_empty());
}

/// Records the address of every memory read.
struct RecordingInferior<'a>
{
    inner: &'a SnapshotInferior,
    reads: RefCell<Vec<Address>>,
}

impl Inferior for RecordingInferior<'_>
{
    fn types(&self) -> &TypeTable
    {
        self.inner.types()
    }

    fn read_memory(&self, address: Address, buf: &mut [u8]) -> VistaResult<()>
    {
        self.reads.borrow_mut().push(address);
        self.inner.read_memory(address, buf)
    }

    fn lookup_symbol(&self, name: &str) -> VistaResult<Value>
    {
        self.inner.lookup_symbol(name)
    }

    fn read_register(&self, name: &str) -> VistaResult<u64>
    {
        self.inner.read_register(name)
    }
}

#[test]
fn test_depth_limit_skips_child_walk()
{
    let mut h = Harness::new();
    let (set, nodes) = h.int_set(&[1, 2, 3]);
    let node_ty = h
        .types()
        .lookup("std::impl::rbtree<int, std::less<int>, std::allocator<int>>::node")
        .unwrap();
    let node_size = h.snapshot.types().get(node_ty).size;
    let touches_node = |reads: &[Address]| {
        reads
            .iter()
            .any(|at| nodes.iter().any(|node| *at >= *node && *at < *node + node_size))
    };

    let recording = RecordingInferior {
        inner: &h.snapshot,
        reads: RefCell::new(Vec::new()),
    };
    let mut limits = Limits::default();
    limits.max_depth = 0;
    let tree = render(Session::new(&recording, &h.registry, &limits), "s", set);
    assert_eq!(tree.summary.as_deref(), Some("std::set of size 3"));
    assert!(tree.children.is_empty());
    assert!(!touches_node(&recording.reads.borrow()));

    recording.reads.borrow_mut().clear();
    let limits = Limits::default();
    let tree = render(Session::new(&recording, &h.registry, &limits), "s", set);
    assert_eq!(tree.children.len(), 3);
    assert!(touches_node(&recording.reads.borrow()));
}

#[test]
fn test_fault_stays_in_its_node()
{
    let mut h = Harness::new();
    let int = h.int();
    let string_ty = h.string_type();
    let vector_ty = h.vector_type(int);
    let holder_ty = StructBuilder::new("task")
        .field("name", string_ty)
        .field("items", vector_ty)
        .finish(h.types())
        .unwrap();
    let holder = h.alloc_value(holder_ty);
    let buffer = h.bytes(&7i32.to_le_bytes());
    h.put_pointer(holder, "name.m_data.value.in.heapdata.m_ptr", Address::new(0xdead_0000));
    h.put_pointer(holder, "items.m_data.value", buffer);
    h.put(holder, "items.m_size", 1);
    h.put(holder, "items.m_capacity", 1);
    let session = h.session();

    let tree = render(session, "task", holder);
    assert_eq!(
        tree.child("name").unwrap().summary.as_deref(),
        Some("<error: Memory inaccessible: 1 bytes at 0xdead0000>")
    );
    let items = tree.child("items").unwrap();
    assert_eq!(items.summary.as_deref(), Some("std::vector of size 1, capacity 1"));
    assert_eq!(summaries(items), [Some("7")]);
}

#[test]
fn test_children_error_becomes_leaf()
{
    let mut h = Harness::new();
    let (set, nodes) = h.int_set(&[1]);
    let node_ty = h
        .types()
        .lookup("std::impl::rbtree<int, std::less<int>, std::allocator<int>>::node")
        .unwrap();
    h.put_pointer(Value::new(nodes[0], node_ty), "left", nodes[0]);
    let session = h.session();

    let tree = render(session, "s", set);
    assert_eq!(tree.summary.as_deref(), Some("std::set of size 1"));
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].label, "[error]");
    assert!(tree.children[0].summary.as_deref().unwrap().starts_with("<error: Invalid layout"));
}

#[test]
fn test_text_display()
{
    let mut h = Harness::new();
    let vector = h.int_vector(&[1, 2], 0);
    let name = h.inline_string("idle");
    let session = h.session();

    let tree = render(session, "v", vector);
    assert_eq!(
        tree.to_string(),
        "v: std::vector<int, std::allocator<int>> = std::vector of size 2, capacity 2\n  0: int = 1\n  1: int = 2\n"
    );
    assert_eq!(
        render(session, "name", name).to_string(),
        "name: std::basic_string<char> = \"idle\"\n"
    );
}

#[test]
fn test_json_output()
{
    let mut h = Harness::new();
    let vector = h.int_vector(&[4], 0);
    let session = h.session();

    let json = serde_json::to_value(render(session, "v", vector)).unwrap();
    assert_eq!(json["label"], "v");
    assert_eq!(json["hint"], "sequence");
    assert_eq!(json["children"][0]["summary"], "4");
    assert_eq!(json["children"][0]["hint"], "none");
    assert!(json["children"][0].get("children").is_none());
}

#[test]
fn test_unknown_symbol()
{
    let h = Harness::new();
    let session = h.session();

    assert!(matches!(render_symbol(session, "missing"), Err(VistaError::SymbolNotFound(_))));
}

const SNAPSHOT: &str = r#"{
    "types": [
        { "kind": "scalar", "name": "int", "size": 4, "encoding": "signed" },
        { "kind": "scalar", "name": "unsigned long", "size": 8, "encoding": "unsigned" },
        { "kind": "pointer", "target": "int" },
        { "kind": "struct", "name": "std::allocator<int>" },
        { "kind": "struct", "name": "std::impl::compressed_pair_element<int*, 0>", "fields": [
            { "name": "value", "type": "int*" } ] },
        { "kind": "struct", "name": "std::impl::compressed_pair_element<std::allocator<int>, 1>", "fields": [
            { "name": "std::allocator<int>", "type": "std::allocator<int>", "base": true } ] },
        { "kind": "struct", "name": "std::impl::compressed_pair<int*, std::allocator<int>>", "fields": [
            { "name": "first", "type": "std::impl::compressed_pair_element<int*, 0>", "base": true },
            { "name": "second", "type": "std::impl::compressed_pair_element<std::allocator<int>, 1>", "base": true } ] },
        { "kind": "struct", "name": "std::vector<int, std::allocator<int>>", "fields": [
            { "name": "m_data", "type": "std::impl::compressed_pair<int*, std::allocator<int>>" },
            { "name": "m_size", "type": "unsigned long" },
            { "name": "m_capacity", "type": "unsigned long" } ] }
    ],
    "memory": [
        { "address": 4096, "bytes": "0020000000000000 0300000000000000 0400000000000000" },
        { "address": 8192, "bytes": "01000000 02000000 03000000 00000000" }
    ],
    "symbols": [ { "name": "numbers", "address": 4096, "type": "std::vector<int, std::allocator<int>>" } ]
}"#;

#[test]
fn test_render_from_snapshot_file()
{
    let snapshot = SnapshotFile::from_json(SNAPSHOT).unwrap().into_inferior().unwrap();
    let registry = Registry::new();
    let limits = Limits::default();
    let session = Session::new(&snapshot, &registry, &limits);

    let tree = render_symbol(session, "numbers").unwrap();
    assert_eq!(tree.summary.as_deref(), Some("std::vector of size 3, capacity 4"));
    assert_eq!(summaries(&tree), [Some("1"), Some("2"), Some("3")]);
}
