use quadstore_core::logging::init_tracing;
use quadstore_core::*;
use std::sync::Arc;

fn main() {
    init_tracing("quadstore_core=info");
    println!("Quadstore quickstart\n");

    // Step 1: Parse a JSON batch
    let quads = parse_json_quads(
        br#"[
            {"subject": "alice", "predicate": "follows", "object": "bob"},
            {"subject": "bob", "predicate": "follows", "object": "charlie"},
            {"subject": "alice", "predicate": "likes", "object": "pizza", "label": "food"}
        ]"#,
    )
    .unwrap();
    println!("Parsed {} quads", quads.len());

    // Step 2: Load them into an in-memory store
    let mut registry = TypeRegistry::new();
    let store = Arc::new(MemoryStore::new(&mut registry, &StoreOptions::default()).unwrap());
    store.add_quad_set(&quads).unwrap();
    println!("Stored {} quads over {} nodes\n", store.size().unwrap(), store.node_count().unwrap());

    // Step 3: Everything alice is the subject of
    let mut it = quad_iterator(&store, Direction::Subject, &store.value_of("alice")).unwrap();
    println!("{}", it.debug_string(0));
    while let Some(key) = it.next() {
        if let Some(quad) = store.quad(&key).unwrap() {
            println!("   {}", quad);
        }
    }
    if let Some(err) = it.last_error() {
        println!("   scan failed: {}", err);
    }

    // Step 4: Membership check without touching the store
    let candidate = store.codec().compound_key("alice", "knows", "dave", "");
    println!("\nalice -- knows -> dave matches subject alice: {}", it.check(&candidate));

    it.close();
}
