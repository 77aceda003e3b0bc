//! Property tests for the reconciler
//!
//! Whatever sequence of mutations a collection goes through, the keys a
//! reconciler has added and not yet removed must be exactly the keys in
//! the collection, and no key is ever removed twice.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use imterra_core::collection::Collection;
use imterra_core::entity::Entity;
use imterra_core::reconcile::Reconciler;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(u8, usize),
    Remove(usize),
    Move(usize, usize),
    Replace(usize, u8),
    Sort,
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16, 0usize..20).prop_map(|(id, at)| Op::Add(id, at)),
        2 => (0usize..20).prop_map(Op::Remove),
        2 => (0usize..20, 0usize..20).prop_map(|(from, to)| Op::Move(from, to)),
        1 => (0usize..20, 0u8..16).prop_map(|(at, id)| Op::Replace(at, id)),
        1 => Just(Op::Sort),
        1 => Just(Op::Clear),
    ]
}

fn entity(id: u8) -> Rc<Entity> {
    Entity::new(format!("e{id}"), "point")
}

fn apply(collection: &Collection<Entity>, op: &Op) {
    let len = collection.len();
    match *op {
        Op::Add(id, at) => {
            collection.add_at([entity(id)], at);
        }
        Op::Remove(at) if len > 0 => {
            if let Some(item) = collection.get(at % len) {
                collection.remove(&item);
            }
        }
        Op::Move(from, to) if len > 0 => {
            if let Some(item) = collection.get(from % len) {
                collection.move_item(&item, to % len);
            }
        }
        Op::Replace(at, id) if len > 0 => {
            collection.replace(at % len, entity(id));
        }
        Op::Sort => collection.sort_by(|a, b| b.id().cmp(a.id())),
        Op::Clear => {
            collection.clear();
        }
        _ => {}
    }
}

#[derive(Default)]
struct Ledger {
    balance: HashMap<String, i32>,
    violations: Vec<String>,
}

impl Ledger {
    fn live(&self) -> BTreeSet<String> {
        self.balance
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

proptest! {
    #[test]
    fn test_tracked_keys_match_collection(ops in prop::collection::vec(op(), 0..60)) {
        let collection = Collection::new("c");
        collection.add((0..4).map(entity));

        let ledger = Rc::new(RefCell::new(Ledger::default()));
        let on_add = Rc::clone(&ledger);
        let on_remove = Rc::clone(&ledger);
        let reconciler = Reconciler::from_fns(
            &collection,
            move |item: &Rc<Entity>, _index| {
                let mut ledger = on_add.borrow_mut();
                let count = ledger.balance.entry(item.id().to_string()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    let message = format!("double add of {}", item.id());
                    ledger.violations.push(message);
                }
            },
            move |item: &Rc<Entity>, ()| {
                let mut ledger = on_remove.borrow_mut();
                let count = ledger.balance.entry(item.id().to_string()).or_insert(0);
                *count -= 1;
                if *count < 0 {
                    let message = format!("unmatched remove of {}", item.id());
                    ledger.violations.push(message);
                }
            },
        );

        for op in &ops {
            apply(&collection, op);
            let expected: BTreeSet<String> = collection.ids().into_iter().collect();
            prop_assert_eq!(ledger.borrow().live(), expected, "after {:?}", op);
            prop_assert_eq!(reconciler.len(), collection.len());
        }

        reconciler.destroy();
        prop_assert!(ledger.borrow().live().is_empty());
        prop_assert!(ledger.borrow().violations.is_empty(), "{:?}", ledger.borrow().violations);
    }

    #[test]
    fn test_moves_never_touch_state(moves in prop::collection::vec((0usize..8, 0usize..8), 1..30)) {
        let collection = Collection::new("c");
        collection.add((0..8).map(entity));

        let events = Rc::new(RefCell::new(0usize));
        let adds = Rc::clone(&events);
        let removes = Rc::clone(&events);
        let _reconciler = Reconciler::from_fns(
            &collection,
            move |_: &Rc<Entity>, _| *adds.borrow_mut() += 1,
            move |_: &Rc<Entity>, ()| *removes.borrow_mut() += 1,
        );
        *events.borrow_mut() = 0;

        for (from, to) in moves {
            if let Some(item) = collection.get(from) {
                collection.move_item(&item, to);
            }
        }
        collection.sort_by(|a, b| a.id().cmp(b.id()));

        prop_assert_eq!(*events.borrow(), 0);
    }
}
