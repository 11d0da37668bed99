//! # Merkle Patricia Trie Demo
//!
//! Walkthrough of the trie API: lookups, updates, deletions, proofs and the
//! value-addressed wrapper.

use patricia_trie::{MemoryDB, MerklePatriciaTrie, TrieError, ValueTrie};

fn main() -> Result<(), TrieError> {
    println!("🌳 Merkle Patricia Trie Demo\n");

    // =========================================
    // Test 1: Empty Trie
    // =========================================
    println!("=== Test 1: Empty Trie ===");
    let trie = MerklePatriciaTrie::new(MemoryDB::new());

    println!("Is empty: {}", trie.is_empty());
    println!("Root hash: 0x{}", hex::encode(trie.root_hash()));
    println!("(This is the well-known empty trie root)");
    println!();

    // =========================================
    // Test 2: Shared Prefix Keys
    // =========================================
    println!("=== Test 2: Shared Prefix Keys ===");
    let mut trie = MerklePatriciaTrie::new(MemoryDB::new());

    trie.update(b"do", b"verb")?;
    trie.update(b"dog", b"puppy")?;
    trie.update(b"doge", b"coin")?;
    trie.update(b"horse", b"stallion")?;

    println!("Inserted:");
    println!("  'do' -> 'verb'");
    println!("  'dog' -> 'puppy'");
    println!("  'doge' -> 'coin'");
    println!("  'horse' -> 'stallion'");
    println!();

    println!("Root hash: 0x{}", hex::encode(trie.root_hash()));
    println!();

    println!("Retrieving values:");
    for key in &["do", "dog", "doge", "horse", "cat"] {
        match trie.get(key.as_bytes()) {
            Ok(v) => println!("  '{}' -> '{}'", key, String::from_utf8_lossy(&v)),
            Err(e) => println!("  '{}' -> NOT FOUND ({})", key, e),
        }
    }
    println!();

    // =========================================
    // Test 3: Deletions Restore Old Roots
    // =========================================
    println!("=== Test 3: Deletions ===");
    let before = trie.root_hash();

    trie.delete(b"doge")?;
    println!("Deleted 'doge'");
    println!("Root: 0x{}...", &hex::encode(trie.root_hash())[..16]);
    println!("Contains 'doge': {}", trie.contains(b"doge"));

    trie.update(b"doge", b"coin")?;
    println!("Re-inserted 'doge' -> 'coin'");
    println!("Root restored: {}", trie.root_hash() == before);
    println!();

    // =========================================
    // Test 4: Proofs
    // =========================================
    println!("=== Test 4: Proofs ===");

    let inclusion = trie.get_proof_of_inclusion(b"dog")?;
    println!(
        "Proof of inclusion for 'dog': {} nodes",
        inclusion.nodes().len()
    );
    println!("Verifies: {}", trie.verify_proof_of_inclusion(&inclusion)?);

    let exclusion = trie.get_proof_of_exclusion(b"cat")?;
    println!(
        "Proof of exclusion for 'cat': {} nodes",
        exclusion.nodes().len()
    );
    println!("Verifies: {}", trie.verify_proof_of_exclusion(&exclusion)?);

    trie.update(b"cat", b"meow")?;
    println!(
        "After inserting 'cat', the old exclusion proof: {:?}",
        trie.verify_proof_of_exclusion(&exclusion)
    );
    println!();

    // =========================================
    // Test 5: Secure Mode
    // =========================================
    println!("=== Test 5: Secure Mode ===");
    let mut secure = MerklePatriciaTrie::new_secure(MemoryDB::new());

    secure.update(b"alice", b"nonce:1,balance:1000000000000000000")?;
    secure.update(b"bob", b"nonce:0,balance:500000000000000000")?;

    println!("State root (2 accounts): 0x{}...", &hex::encode(secure.root_hash())[..16]);
    println!(
        "Get 'alice': '{}'",
        String::from_utf8_lossy(&secure.get(b"alice")?)
    );
    println!();

    // =========================================
    // Test 6: Value-Addressed Trie
    // =========================================
    println!("=== Test 6: Value-Addressed Trie ===");
    let mut store = ValueTrie::new(MemoryDB::new());

    let key = store.put(b"content addressed payload")?;
    println!("Stored payload under key: 0x{}...", &hex::encode(key)[..16]);
    println!(
        "Lookup by key: '{}'",
        String::from_utf8_lossy(&store.get(key)?)
    );

    let blob = store.to_bytes()?;
    println!("Snapshot size: {} bytes", blob.len());

    let restored = ValueTrie::from_bytes(&blob)?;
    println!(
        "Restored snapshot, same root: {}",
        restored.root_hash() == store.root_hash()
    );

    Ok(())
}
