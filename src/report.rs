// Plain-text renderings of the two views, for non-interactive use

use std::fmt;

use crate::funnel::FunnelGrouping;
use crate::store::CustomerCollection;

/// Customers table: initials, name, email, status
pub struct TableReport<'a>(pub &'a CustomerCollection);

impl fmt::Display for TableReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<4} {:<5} {:<24} {:<28} {}", "ID", "", "Name", "Email", "Status")?;
        writeln!(f, "{}", "─".repeat(80))?;

        for customer in self.0.iter() {
            writeln!(
                f,
                "{:<4} {:<5} {:<24} {:<28} {}",
                customer.id,
                format!("[{}]", customer.initials()),
                customer.name,
                customer.email,
                customer.status,
            )?;
        }

        writeln!(f, "\n{} customers", self.0.len())
    }
}

/// Stage counts followed by each stage's customers, in funnel order
pub struct FunnelReport<'a>(pub &'a FunnelGrouping);

impl fmt::Display for FunnelReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<String> = self
            .0
            .counts()
            .iter()
            .map(|(status, count)| format!("{}: {}", status, count))
            .collect();
        writeln!(f, "{}", counts.join("  |  "))?;

        for (status, bucket) in self.0.stages() {
            writeln!(f, "\n{} ({})", status, bucket.len())?;
            for customer in bucket {
                writeln!(
                    f,
                    "  [{}] {:<24} {}",
                    customer.initials(),
                    customer.name,
                    customer.email
                )?;
            }
        }
        Ok(())
    }
}

pub fn format_table(collection: &CustomerCollection) -> String {
    TableReport(collection).to_string()
}

pub fn format_funnel(funnel: &FunnelGrouping) -> String {
    FunnelReport(funnel).to_string()
}
