//! Layout builders shared by the integration tests.
//!
//! Each builder registers the container's types in a snapshot and writes one
//! instance into freshly allocated memory, mirroring the runtime's layouts.

#![allow(dead_code)]

use vista_core::prelude::*;

pub const SIZE_T: &str = "unsigned long";

/// Bytes of the inline string buffer, including the terminating NUL.
pub const INLINE_BUFFER: u64 = 23;

/// Everything a decode needs, owned in one place.
pub struct Harness
{
    pub snapshot: SnapshotInferior,
    pub registry: Registry,
    pub limits: Limits,
}

impl Harness
{
    pub fn new() -> Self
    {
        Self {
            snapshot: SnapshotInferior::new(TypeTable::new()),
            registry: Registry::new(),
            limits: Limits::default(),
        }
    }

    pub fn session(&self) -> Session<'_>
    {
        Session::new(&self.snapshot, &self.registry, &self.limits)
    }

    pub fn types(&mut self) -> &mut TypeTable
    {
        self.snapshot.types_mut()
    }

    pub fn scalar(&mut self, name: &str, kind: ScalarKind, size: u64) -> TypeId
    {
        match self.types().lookup(name) {
            Some(id) => id,
            None => self.types().scalar(name, kind, size),
        }
    }

    pub fn size_t(&mut self) -> TypeId
    {
        self.scalar(SIZE_T, ScalarKind::Unsigned, 8)
    }

    pub fn int(&mut self) -> TypeId
    {
        self.scalar("int", ScalarKind::Signed, 4)
    }

    pub fn char_t(&mut self) -> TypeId
    {
        self.scalar("char", ScalarKind::Char, 1)
    }

    pub fn u8_t(&mut self) -> TypeId
    {
        self.scalar("u8", ScalarKind::Unsigned, 1)
    }

    /// A struct without data, such as an allocator or a comparator.
    pub fn empty(&mut self, name: &str) -> TypeId
    {
        match self.types().lookup(name) {
            Some(id) => id,
            None => StructBuilder::new(name).finish(self.types()).unwrap(),
        }
    }

    /// Compressed pair whose elements are carried by bases; `second` is empty
    /// and takes no storage.
    pub fn compressed_pair(&mut self, first: TypeId, second: TypeId) -> TypeId
    {
        let first_name = self.types().display_name(first);
        let second_name = self.types().display_name(second);
        let name = format!("std::impl::compressed_pair<{first_name}, {second_name}>");
        if let Some(id) = self.types().lookup(&name) {
            return id;
        }
        let first_carrier = StructBuilder::new(&format!("std::impl::compressed_pair_element<{first_name}, 0>"))
            .field("value", first)
            .finish(self.types())
            .unwrap();
        let second_carrier = StructBuilder::new(&format!("std::impl::compressed_pair_element<{second_name}, 1>"))
            .base(&second_name, second)
            .finish(self.types())
            .unwrap();
        StructBuilder::new(&name)
            .base("first", first_carrier)
            .base("second", second_carrier)
            .finish(self.types())
            .unwrap()
    }

    pub fn alloc_value(&mut self, ty: TypeId) -> Value
    {
        let size = self.snapshot.types().get(ty).size;
        Value::new(self.snapshot.alloc(size), ty)
    }

    /// Write an integer into the field at `path`, using the field's width.
    pub fn put(&mut self, value: Value, path: &str, raw: u64)
    {
        let field = value.path(&self.snapshot, path).unwrap();
        let width = usize::try_from(field.size(&self.snapshot)).unwrap();
        self.snapshot.write(field.address(), &raw.to_le_bytes()[..width]).unwrap();
    }

    pub fn put_pointer(&mut self, value: Value, path: &str, target: Address)
    {
        self.put(value, path, target.value());
    }

    /// Allocate `data` and return its address.
    pub fn bytes(&mut self, data: &[u8]) -> Address
    {
        let at = self.snapshot.alloc(data.len() as u64);
        self.snapshot.write(at, data).unwrap();
        at
    }

    // -- vector ------------------------------------------------------------

    pub fn vector_type(&mut self, element: TypeId) -> TypeId
    {
        let element_name = self.types().display_name(element);
        let alloc = self.empty(&format!("std::allocator<{element_name}>"));
        let pointer = self.types().pointer_to(element);
        let data = self.compressed_pair(pointer, alloc);
        let size_t = self.size_t();
        StructBuilder::new(&format!("std::vector<{element_name}, std::allocator<{element_name}>>"))
            .field("m_data", data)
            .field("m_size", size_t)
            .field("m_capacity", size_t)
            .finish(self.types())
            .unwrap()
    }

    /// A `std::vector<int>` holding `items`, with `spare` unused slots.
    pub fn int_vector(&mut self, items: &[i32], spare: u64) -> Value
    {
        let int = self.int();
        let ty = self.vector_type(int);
        let capacity = items.len() as u64 + spare;
        let buffer = if capacity == 0 { Address::NULL } else { self.snapshot.alloc(capacity * 4) };
        for (index, item) in items.iter().enumerate() {
            self.snapshot.write(buffer.element(index as u64, 4), &item.to_le_bytes()).unwrap();
        }
        let vector = self.alloc_value(ty);
        self.put_pointer(vector, "m_data.value", buffer);
        self.put(vector, "m_size", items.len() as u64);
        self.put(vector, "m_capacity", capacity);
        vector
    }

    pub fn vector_iterator_type(&mut self, element: TypeId) -> TypeId
    {
        let vector = self.vector_type(element);
        let vector_name = self.types().display_name(vector);
        let pointer = self.types().pointer_to(element);
        StructBuilder::new(&format!("{vector_name}::_iterator<false>"))
            .field("m_ptr", pointer)
            .finish(self.types())
            .unwrap()
    }

    // -- string ------------------------------------------------------------

    pub fn string_type(&mut self) -> TypeId
    {
        if let Some(id) = self.types().lookup("std::basic_string<char>") {
            return id;
        }
        let char_t = self.char_t();
        let size_t = self.size_t();
        let inline = self.types().array_of(char_t, INLINE_BUFFER);
        let char_ptr = self.types().pointer_to(char_t);
        let stack = StructBuilder::new("std::basic_string<char>::stackdata_t")
            .field("str", inline)
            .field("end", char_t)
            .finish(self.types())
            .unwrap();
        let heap = StructBuilder::new("std::basic_string<char>::heapdata_t")
            .field("m_ptr", char_ptr)
            .field("m_size", size_t)
            .field("m_capacity", size_t)
            .finish(self.types())
            .unwrap();
        let storage = StructBuilder::new("std::basic_string<char>::storage_t")
            .union()
            .field("stackdata", stack)
            .field("heapdata", heap)
            .finish(self.types())
            .unwrap();
        let repr = StructBuilder::new("std::basic_string<char>::repr_t")
            .field("in", storage)
            .finish(self.types())
            .unwrap();
        let alloc = self.empty("std::allocator<char>");
        let data = self.compressed_pair(repr, alloc);
        StructBuilder::new("std::basic_string<char>")
            .field("m_data", data)
            .finish(self.types())
            .unwrap()
    }

    /// A string stored in the inline buffer. The last buffer byte is always
    /// the NUL, so `end` is never zero for an inline string.
    pub fn inline_string(&mut self, text: &str) -> Value
    {
        assert!((text.len() as u64) < INLINE_BUFFER);
        let ty = self.string_type();
        let string = self.alloc_value(ty);
        let inline = string.path(&self.snapshot, "m_data.value.in.stackdata.str").unwrap();
        self.snapshot.write(inline.address(), text.as_bytes()).unwrap();
        self.put(string, "m_data.value.in.stackdata.end", INLINE_BUFFER - text.len() as u64);
        string
    }

    /// A string stored in a heap buffer.
    pub fn heap_string(&mut self, text: &str) -> Value
    {
        let ty = self.string_type();
        let mut buffer = text.as_bytes().to_vec();
        buffer.push(0);
        let heap = self.bytes(&buffer);
        let string = self.alloc_value(ty);
        self.put_pointer(string, "m_data.value.in.heapdata.m_ptr", heap);
        self.put(string, "m_data.value.in.heapdata.m_size", text.len() as u64);
        self.put(string, "m_data.value.in.heapdata.m_capacity", text.len() as u64);
        self.put(string, "m_data.value.in.stackdata.end", 0);
        string
    }

    pub fn string_view(&mut self, text: &str) -> Value
    {
        let char_t = self.char_t();
        let size_t = self.size_t();
        let char_ptr = self.types().pointer_to(char_t);
        let ty = StructBuilder::new("types::string_view")
            .field("m_str", char_ptr)
            .field("m_len", size_t)
            .finish(self.types())
            .unwrap();
        let data = self.bytes(text.as_bytes());
        let view = self.alloc_value(ty);
        self.put_pointer(view, "m_str", data);
        self.put(view, "m_len", text.len() as u64);
        view
    }

    // -- list --------------------------------------------------------------

    /// `std::list<int>` types: (list, node).
    pub fn list_types(&mut self) -> (TypeId, TypeId)
    {
        let name = "std::list<int, std::allocator<int>>";
        let int = self.int();
        let size_t = self.size_t();
        let base = self.types().declare(&format!("{name}::node_base"));
        let base_ptr = self.types().pointer_to(base);
        let base = StructBuilder::new(&format!("{name}::node_base"))
            .field("prev", base_ptr)
            .field("next", base_ptr)
            .finish(self.types())
            .unwrap();
        let node = StructBuilder::new(&format!("{name}::node"))
            .base(&format!("{name}::node_base"), base)
            .field("value", int)
            .finish(self.types())
            .unwrap();
        let alloc = self.empty(&format!("std::allocator<{name}::node>"));
        let pair = self.compressed_pair(size_t, alloc);
        let list = StructBuilder::new(name)
            .field("m_head", base)
            .field("m_pair", pair)
            .finish(self.types())
            .unwrap();
        (list, node)
    }

    /// A list holding `items`; returns the list and its node addresses.
    pub fn int_list(&mut self, items: &[i32]) -> (Value, Vec<Address>)
    {
        let (list_ty, node_ty) = self.list_types();
        let list = self.alloc_value(list_ty);
        let head = list.field(&self.snapshot, "m_head").unwrap().address();
        let node_size = self.snapshot.types().get(node_ty).size;

        let nodes: Vec<Address> = items.iter().map(|_| self.snapshot.alloc(node_size)).collect();
        let mut ring = vec![head];
        ring.extend(&nodes);
        for (index, at) in ring.iter().enumerate() {
            let node = Value::new(*at, node_ty);
            let next = ring[(index + 1) % ring.len()];
            let prev = ring[(index + ring.len() - 1) % ring.len()];
            self.put_pointer(node, "next", next);
            self.put_pointer(node, "prev", prev);
        }
        for (at, item) in nodes.iter().zip(items) {
            let node = Value::new(*at, node_ty);
            self.put(node, "value", *item as u32 as u64);
        }
        self.put(list, "m_pair.value", items.len() as u64);
        (list, nodes)
    }

    pub fn list_iterator(&mut self, target: Address) -> Value
    {
        let (list_ty, _) = self.list_types();
        let name = self.types().display_name(list_ty);
        let base = self.types().lookup(&format!("{name}::node_base")).unwrap();
        let base_ptr = self.types().pointer_to(base);
        let ty = StructBuilder::new(&format!("{name}::_iterator<false>"))
            .field("p", base_ptr)
            .finish(self.types())
            .unwrap();
        let iterator = self.alloc_value(ty);
        self.put_pointer(iterator, "p", target);
        iterator
    }

    // -- ordered set -------------------------------------------------------

    /// `std::set<int>` types: (set, node).
    pub fn set_types(&mut self) -> (TypeId, TypeId)
    {
        let tree_name = "std::impl::rbtree<int, std::less<int>, std::allocator<int>>";
        let int = self.int();
        let size_t = self.size_t();
        let u8_t = self.u8_t();
        let node = self.types().declare(&format!("{tree_name}::node"));
        let node_ptr = self.types().pointer_to(node);
        let node = StructBuilder::new(&format!("{tree_name}::node"))
            .field("left", node_ptr)
            .field("right", node_ptr)
            .field("parent", node_ptr)
            .field("color", u8_t)
            .field("value", int)
            .finish(self.types())
            .unwrap();
        let alloc = self.empty(&format!("std::allocator<{tree_name}::node>"));
        let less = self.empty("std::less<int>");
        let root_data = self.compressed_pair(node_ptr, alloc);
        let size_data = self.compressed_pair(size_t, less);
        let tree = StructBuilder::new(tree_name)
            .field("root_data", root_data)
            .field("size_data", size_data)
            .finish(self.types())
            .unwrap();
        let set = StructBuilder::new("std::set<int, std::less<int>, std::allocator<int>>")
            .field("tree", tree)
            .finish(self.types())
            .unwrap();
        (set, node)
    }

    /// A balanced tree over the sorted `keys`; returns the set and the node
    /// addresses in key order.
    pub fn int_set(&mut self, keys: &[i32]) -> (Value, Vec<Address>)
    {
        let (set_ty, node_ty) = self.set_types();
        let node_size = self.snapshot.types().get(node_ty).size;
        let nodes: Vec<Address> = keys.iter().map(|_| self.snapshot.alloc(node_size)).collect();
        for (at, key) in nodes.iter().zip(keys) {
            self.put(Value::new(*at, node_ty), "value", *key as u32 as u64);
        }
        let root = self.link_subtree(node_ty, &nodes, Address::NULL);

        let set = self.alloc_value(set_ty);
        self.put_pointer(set, "tree.root_data.value", root);
        self.put(set, "tree.size_data.value", keys.len() as u64);
        (set, nodes)
    }

    fn link_subtree(&mut self, node_ty: TypeId, nodes: &[Address], parent: Address) -> Address
    {
        if nodes.is_empty() {
            return Address::NULL;
        }
        let middle = nodes.len() / 2;
        let at = nodes[middle];
        let left = self.link_subtree(node_ty, &nodes[..middle], at);
        let right = self.link_subtree(node_ty, &nodes[middle + 1..], at);
        let node = Value::new(at, node_ty);
        self.put_pointer(node, "left", left);
        self.put_pointer(node, "right", right);
        self.put_pointer(node, "parent", parent);
        at
    }

    // -- pointers ----------------------------------------------------------

    /// `struct point { int x; int y; }` at a fresh address.
    pub fn point(&mut self, x: i32, y: i32) -> Value
    {
        let int = self.int();
        let ty = match self.types().lookup("point") {
            Some(id) => id,
            None => StructBuilder::new("point")
                .field("x", int)
                .field("y", int)
                .finish(self.types())
                .unwrap(),
        };
        let point = self.alloc_value(ty);
        self.put(point, "x", x as u32 as u64);
        self.put(point, "y", y as u32 as u64);
        point
    }

    pub fn shared_ptr(&mut self, target: Option<Value>, strong: u64, weak: u64) -> Value
    {
        let point = self.point(0, 0).type_id();
        let size_t = self.size_t();
        let point_ptr = self.types().pointer_to(point);
        let cb = match self.types().lookup("std::impl::control_block<point>") {
            Some(id) => id,
            None => StructBuilder::new("std::impl::control_block<point>")
                .field("ref_count", size_t)
                .field("weak_count", size_t)
                .field("ptr", point_ptr)
                .finish(self.types())
                .unwrap(),
        };
        let cb_ptr = self.types().pointer_to(cb);
        let ty = match self.types().lookup("std::shared_ptr<point>") {
            Some(id) => id,
            None => StructBuilder::new("std::shared_ptr<point>")
                .field("ptr", point_ptr)
                .field("cb", cb_ptr)
                .finish(self.types())
                .unwrap(),
        };

        let shared = self.alloc_value(ty);
        if let Some(target) = target {
            let block = self.alloc_value(cb);
            self.put(block, "ref_count", strong);
            self.put(block, "weak_count", weak);
            self.put_pointer(block, "ptr", target.address());
            self.put_pointer(shared, "ptr", target.address());
            self.put_pointer(shared, "cb", block.address());
        }
        shared
    }

    pub fn unique_ptr(&mut self, target: Option<Value>) -> Value
    {
        let point = self.point(0, 0).type_id();
        let point_ptr = self.types().pointer_to(point);
        let deleter = self.empty("std::default_delete<point>");
        let data = self.compressed_pair(point_ptr, deleter);
        let ty = StructBuilder::new("std::unique_ptr<point>")
            .field("data", data)
            .finish(self.types())
            .unwrap();
        let unique = self.alloc_value(ty);
        if let Some(target) = target {
            self.put_pointer(unique, "data.value", target.address());
        }
        unique
    }

    // -- Rust pointers -----------------------------------------------------

    pub fn unsafe_cell(&mut self, inner: TypeId) -> TypeId
    {
        let inner_name = self.types().display_name(inner);
        let name = format!("core::cell::UnsafeCell<{inner_name}>");
        match self.types().lookup(&name) {
            Some(id) => id,
            None => StructBuilder::new(&name).field("value", inner).finish(self.types()).unwrap(),
        }
    }

    pub fn atomic_usize(&mut self) -> TypeId
    {
        if let Some(id) = self.types().lookup("core::sync::atomic::AtomicUsize") {
            return id;
        }
        let usize_t = self.scalar("usize", ScalarKind::Unsigned, 8);
        let cell = self.unsafe_cell(usize_t);
        StructBuilder::new("core::sync::atomic::AtomicUsize")
            .field("v", cell)
            .finish(self.types())
            .unwrap()
    }

    fn arc_inner(&mut self, payload_name: &str, data: TypeId) -> TypeId
    {
        let atomic = self.atomic_usize();
        StructBuilder::new(&format!("alloc::sync::ArcInner<{payload_name}>"))
            .field("strong", atomic)
            .field("weak", atomic)
            .field("data", data)
            .finish(self.types())
            .unwrap()
    }

    /// `Arc<[u8]>` over `bytes`. Only the first `readable` payload bytes are
    /// mapped.
    pub fn arc_bytes(&mut self, bytes: &[u8], readable: usize, strong: u64, weak: u64) -> Value
    {
        let u8_t = self.u8_t();
        let usize_t = self.scalar("usize", ScalarKind::Unsigned, 8);
        let tail = self.types().array_of(u8_t, 0);
        let inner = self.arc_inner("[u8]", tail);
        let inner_ptr = self.types().pointer_to(inner);
        let wide = StructBuilder::new("*const alloc::sync::ArcInner<[u8]>")
            .field("data_ptr", inner_ptr)
            .field("length", usize_t)
            .finish(self.types())
            .unwrap();
        let non_null = StructBuilder::new("core::ptr::non_null::NonNull<alloc::sync::ArcInner<[u8]>>")
            .field("pointer", wide)
            .finish(self.types())
            .unwrap();
        let arc = StructBuilder::new("alloc::sync::Arc<[u8]>")
            .field("ptr", non_null)
            .finish(self.types())
            .unwrap();

        let header = self.snapshot.types().get(inner).size;
        let mut image = vec![0u8; usize::try_from(header).unwrap() + readable];
        image[..8].copy_from_slice(&strong.to_le_bytes());
        image[8..16].copy_from_slice(&(weak + 1).to_le_bytes());
        image[16..16 + readable].copy_from_slice(&bytes[..readable]);
        let at = Address::new(0x7000_0000);
        self.snapshot.map(at, image);

        let value = self.alloc_value(arc);
        self.put_pointer(value, "ptr.pointer.data_ptr", at);
        self.put(value, "ptr.pointer.length", bytes.len() as u64);
        value
    }

    /// `Arc<point>` with the given counts.
    pub fn arc_point(&mut self, x: i32, y: i32, strong: u64, weak: u64) -> Value
    {
        let point = self.point(0, 0).type_id();
        let inner = self.arc_inner("point", point);
        let inner_ptr = self.types().pointer_to(inner);
        let non_null = StructBuilder::new("core::ptr::non_null::NonNull<alloc::sync::ArcInner<point>>")
            .field("pointer", inner_ptr)
            .finish(self.types())
            .unwrap();
        let arc = StructBuilder::new("alloc::sync::Arc<point>")
            .field("ptr", non_null)
            .finish(self.types())
            .unwrap();

        let block = self.alloc_value(inner);
        self.put(block, "strong.v.value", strong);
        self.put(block, "weak.v.value", weak + 1);
        self.put(block, "data.x", x as u32 as u64);
        self.put(block, "data.y", y as u32 as u64);

        let value = self.alloc_value(arc);
        self.put_pointer(value, "ptr.pointer", block.address());
        value
    }
}

/// Children of a decoded value as (label, summary-or-marker) strings.
pub fn flatten(session: Session<'_>, value: Value) -> Vec<(String, String)>
{
    let decoder = session.select(value).expect("value has a decoder");
    decoder
        .children()
        .unwrap()
        .map(|child| {
            let shown = match &child.value {
                ChildValue::Value(value) => describe(session, *value),
                ChildValue::Text(text) => text.clone(),
            };
            (child.label, shown)
        })
        .collect()
}

/// Summary of a value through its decoder, or its scalar rendering.
pub fn describe(session: Session<'_>, value: Value) -> String
{
    let summary = match session.select(value) {
        Some(decoder) => decoder.summary(),
        None => value.format_scalar(session.inferior()),
    };
    summary.unwrap().unwrap_or_default()
}
