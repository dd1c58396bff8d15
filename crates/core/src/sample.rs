//! The five-metric demo corpus. Shared by the dataset generator and tests so
//! both exercise the same lineage the documentation talks about.

use crate::lineage::{Lineage, Metric, Step};

fn step(id: &str, sql: &str, description: &str) -> Step {
    Step {
        id: id.to_string(),
        sql: sql.to_string(),
        description: description.to_string(),
    }
}

pub fn sample_lineage() -> Lineage {
    let metrics = vec![
        Metric {
            metric: "total_revenue".to_string(),
            description: "Total revenue is the sum of all transaction amounts across all dates and regions.".to_string(),
            steps: vec![step(
                "t1",
                "SELECT SUM(amount) as total_revenue FROM transactions;",
                "Aggregate all transactions and sum the 'amount' column to obtain total revenue.",
            )],
        },
        Metric {
            metric: "revenue_q2_2023".to_string(),
            description: "Revenue for Q2 2023 (Apr 1 to Jun 30, 2023).".to_string(),
            steps: vec![
                step(
                    "q2_1",
                    "SELECT * FROM transactions WHERE date BETWEEN '2023-04-01' AND '2023-06-30';",
                    "Filter transactions to dates within Q2 2023.",
                ),
                step(
                    "q2_2",
                    "SELECT SUM(amount) as q2_revenue FROM <filtered> ;",
                    "Sum amounts from the filtered transaction set to compute Q2 revenue.",
                ),
            ],
        },
        Metric {
            metric: "gross_margin_percentage_by_product".to_string(),
            description: "Gross margin percentage per product = (revenue_by_product - cogs_by_product) / revenue_by_product".to_string(),
            steps: vec![
                step(
                    "g1",
                    "SELECT product_id, SUM(amount) as revenue FROM transactions GROUP BY product_id;",
                    "Aggregate revenue by product using transactions grouped by product_id.",
                ),
                step(
                    "g2",
                    "SELECT product_id, SUM(cost) as cogs FROM transactions GROUP BY product_id;",
                    "Aggregate COGS by product (using transaction-level 'cost' field).",
                ),
                step(
                    "g3",
                    "SELECT r.product_id, (r.revenue - c.cogs) / r.revenue as gross_margin_pct FROM revenue r JOIN cogs c ON r.product_id = c.product_id;",
                    "Join revenue and cogs by product and compute (revenue - cogs)/revenue for each product.",
                ),
            ],
        },
        Metric {
            metric: "net_income_2023".to_string(),
            description: "Net income for calendar year 2023 approximated as total revenue in 2023 minus operating expenses dated in 2023.".to_string(),
            steps: vec![
                step(
                    "n1",
                    "SELECT SUM(amount) as rev_2023 FROM transactions WHERE date BETWEEN '2023-01-01' AND '2023-12-31';",
                    "Sum transaction amounts for 2023 to get revenue in 2023.",
                ),
                step(
                    "n2",
                    "SELECT SUM(amount) as expenses_2023 FROM expenses WHERE date BETWEEN '2023-01-01' AND '2023-12-31';",
                    "Sum expenses in 2023.",
                ),
                step(
                    "n3",
                    "SELECT rev_2023 - expenses_2023 as net_income_2023;",
                    "Subtract expenses from revenue to compute net income.",
                ),
            ],
        },
        Metric {
            metric: "customer_ltv".to_string(),
            description: "Simplified customer lifetime value (CLV): average revenue per customer * expected customer lifetime (in years).".to_string(),
            steps: vec![
                step(
                    "c1",
                    "SELECT customer_id, SUM(amount) as revenue_per_customer FROM transactions GROUP BY customer_id;",
                    "Aggregate revenue per customer.",
                ),
                step(
                    "c2",
                    "SELECT AVG(revenue_per_customer) as avg_rev_per_customer FROM <customer_revenue> ;",
                    "Compute average revenue per customer across all customers.",
                ),
                step(
                    "c3",
                    "# business rule: use expected lifetime = 3 years",
                    "Apply business rule: expected customer lifetime = 3 years.",
                ),
                step(
                    "c4",
                    "SELECT avg_rev_per_customer * 3 as expected_customer_ltv;",
                    "Multiply average revenue per customer by expected lifetime to get CLV.",
                ),
            ],
        },
    ];
    Lineage::from_metrics(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_has_five_metrics() {
        let lineage = sample_lineage();
        assert_eq!(lineage.len(), 5);
        assert_eq!(lineage.step_count(), 13);
        for name in [
            "total_revenue",
            "revenue_q2_2023",
            "gross_margin_percentage_by_product",
            "net_income_2023",
            "customer_ltv",
        ] {
            assert!(lineage.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn gross_margin_steps_are_ordered() {
        let lineage = sample_lineage();
        let metric = lineage.get("gross_margin_percentage_by_product").unwrap();
        let ids: Vec<&str> = metric.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["g1", "g2", "g3"]);
    }

    #[test]
    fn total_revenue_is_single_step() {
        let lineage = sample_lineage();
        assert_eq!(lineage.get("total_revenue").unwrap().steps.len(), 1);
    }
}
