// Funnel grouping - stable partition of a collection by status
//
// Derived on every render from the current snapshot and never stored.
// Buckets appear on first use; a missing bucket reads as empty.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::customer::{Customer, CustomerStatus};
use crate::store::CustomerCollection;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelGrouping {
    buckets: BTreeMap<CustomerStatus, Vec<Arc<Customer>>>,
}

impl FunnelGrouping {
    /// Single left-to-right pass; order within a bucket is source order
    pub fn group(collection: &CustomerCollection) -> Self {
        let mut buckets: BTreeMap<CustomerStatus, Vec<Arc<Customer>>> = BTreeMap::new();
        for customer in collection.iter() {
            buckets
                .entry(customer.status)
                .or_default()
                .push(Arc::clone(customer));
        }
        FunnelGrouping { buckets }
    }

    pub fn bucket(&self, status: CustomerStatus) -> &[Arc<Customer>] {
        self.buckets.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, status: CustomerStatus) -> usize {
        self.bucket(status).len()
    }

    /// Whether the bucket has been populated at all
    pub fn contains(&self, status: CustomerStatus) -> bool {
        self.buckets.contains_key(&status)
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// All stages in funnel order, empty ones included
    pub fn stages(&self) -> impl Iterator<Item = (CustomerStatus, &[Arc<Customer>])> {
        CustomerStatus::ALL
            .into_iter()
            .map(move |status| (status, self.bucket(status)))
    }

    pub fn counts(&self) -> Vec<(CustomerStatus, usize)> {
        self.stages().map(|(status, bucket)| (status, bucket.len())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_customers;

    fn seed() -> CustomerCollection {
        CustomerCollection::new(seed_customers()).unwrap()
    }

    fn ids(bucket: &[Arc<Customer>]) -> Vec<u32> {
        bucket.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_seed_counts() {
        let funnel = FunnelGrouping::group(&seed());

        assert_eq!(
            funnel.counts(),
            vec![
                (CustomerStatus::New, 2),
                (CustomerStatus::ContractSent, 2),
                (CustomerStatus::ContractSigned, 1),
            ]
        );
        assert_eq!(funnel.total(), 5);
    }

    #[test]
    fn test_partition_preserves_source_order() {
        let funnel = FunnelGrouping::group(&seed());

        assert_eq!(ids(funnel.bucket(CustomerStatus::New)), vec![1, 4]);
        assert_eq!(ids(funnel.bucket(CustomerStatus::ContractSent)), vec![2, 5]);
        assert_eq!(ids(funnel.bucket(CustomerStatus::ContractSigned)), vec![3]);
    }

    #[test]
    fn test_every_record_in_its_own_bucket() {
        let collection = seed()
            .set_status(2, CustomerStatus::New)
            .set_status(3, CustomerStatus::New);
        let funnel = FunnelGrouping::group(&collection);

        let mut seen: Vec<u32> = Vec::new();
        for (status, bucket) in funnel.stages() {
            for customer in bucket {
                assert_eq!(customer.status, status);
                seen.push(customer.id);
            }
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        // Stable partition, not a sort by id
        assert_eq!(ids(funnel.bucket(CustomerStatus::New)), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_absent_bucket_reads_empty() {
        let collection = seed().set_status(3, CustomerStatus::New);
        let funnel = FunnelGrouping::group(&collection);

        assert!(!funnel.contains(CustomerStatus::ContractSigned));
        assert_eq!(funnel.count(CustomerStatus::ContractSigned), 0);
        assert!(funnel.bucket(CustomerStatus::ContractSigned).is_empty());
        assert_eq!(funnel.stages().count(), 3);
    }

    #[test]
    fn test_empty_collection() {
        let funnel = FunnelGrouping::group(&CustomerCollection::default());
        assert_eq!(funnel.total(), 0);
        assert!(funnel.counts().iter().all(|(_, count)| *count == 0));
    }

    #[test]
    fn test_regroup_after_status_change() {
        let collection = seed().set_status(1, CustomerStatus::ContractSigned);
        let funnel = FunnelGrouping::group(&collection);

        assert_eq!(funnel.count(CustomerStatus::New), 1);
        assert_eq!(funnel.count(CustomerStatus::ContractSent), 2);
        assert_eq!(funnel.count(CustomerStatus::ContractSigned), 2);

        let signed = funnel.bucket(CustomerStatus::ContractSigned);
        let alice = signed.iter().find(|c| c.id == 1).unwrap();
        assert_eq!(alice.name, "Alice Johnson");
        assert_eq!(ids(signed), vec![1, 3]);
    }

    #[test]
    fn test_unknown_id_leaves_grouping_identical() {
        let original = seed();
        let funnel_before = FunnelGrouping::group(&original);
        let funnel_after = FunnelGrouping::group(&original.set_status(999, CustomerStatus::New));

        assert_eq!(funnel_before, funnel_after);
    }

    mod properties {
        use proptest::prelude::*;

        use crate::customer::CustomerStatus;
        use crate::funnel::FunnelGrouping;
        use crate::strategies::any_collection;

        proptest! {
            #[test]
            fn test_grouping_is_a_partition(collection in any_collection(40)) {
                let funnel = FunnelGrouping::group(&collection);

                let mut grouped: Vec<u32> = Vec::new();
                for (status, bucket) in funnel.stages() {
                    for customer in bucket {
                        prop_assert_eq!(customer.status, status);
                        grouped.push(customer.id);
                    }
                }
                let mut source: Vec<u32> = collection.iter().map(|c| c.id).collect();
                grouped.sort_unstable();
                source.sort_unstable();
                prop_assert_eq!(grouped, source);
                prop_assert_eq!(funnel.total(), collection.len());
            }

            #[test]
            fn test_bucket_order_follows_source(collection in any_collection(40)) {
                let funnel = FunnelGrouping::group(&collection);

                for status in CustomerStatus::ALL {
                    let filtered: Vec<u32> = collection
                        .iter()
                        .filter(|c| c.status == status)
                        .map(|c| c.id)
                        .collect();
                    let bucket: Vec<u32> = funnel.bucket(status).iter().map(|c| c.id).collect();
                    prop_assert_eq!(bucket, filtered);
                }
            }

            #[test]
            fn test_bucket_shares_source_records(collection in any_collection(40)) {
                let funnel = FunnelGrouping::group(&collection);

                for (_, bucket) in funnel.stages() {
                    for customer in bucket {
                        let source = collection.find(customer.id).unwrap();
                        prop_assert!(std::sync::Arc::ptr_eq(source, customer));
                    }
                }
            }
        }
    }
}
