//! proptest strategies shared by the store and funnel tests

use proptest::prelude::*;

use crate::customer::{Customer, CustomerStatus};
use crate::store::CustomerCollection;

/// Ids are drawn below this bound; anything at or above it is never present
pub const MAX_ID: u32 = 500;

pub fn any_status() -> impl Strategy<Value = CustomerStatus> {
    prop_oneof![
        Just(CustomerStatus::New),
        Just(CustomerStatus::ContractSent),
        Just(CustomerStatus::ContractSigned),
    ]
}

/// Unique ids in random order, each with a random status
pub fn any_customers(max_len: usize) -> impl Strategy<Value = Vec<Customer>> {
    prop::collection::btree_set(1..MAX_ID, 0..=max_len)
        .prop_flat_map(|ids| {
            let len = ids.len();
            (
                Just(ids.into_iter().collect::<Vec<u32>>()).prop_shuffle(),
                prop::collection::vec(any_status(), len),
            )
        })
        .prop_map(|(ids, statuses)| {
            ids.into_iter()
                .zip(statuses)
                .map(|(id, status)| {
                    let name = format!("Customer {}", id);
                    let email = format!("c{}@example.com", id);
                    Customer::new(id, name, email, status)
                })
                .collect()
        })
}

pub fn any_collection(max_len: usize) -> impl Strategy<Value = CustomerCollection> {
    any_customers(max_len).prop_map(|customers| {
        CustomerCollection::new(customers).expect("strategy yields unique ids")
    })
}

/// Identifier guaranteed absent from any generated collection
pub fn absent_id() -> impl Strategy<Value = u32> {
    MAX_ID..MAX_ID * 2
}
