use std::collections::HashMap;

use crate::constants::SHOPPING_LIST_HEADER;

use super::schema::ShoppingListRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums amounts per (name, unit). Groups keep the order in which they were first seen.
pub fn aggregate<I>(rows: I) -> Vec<ShoppingItem>
where
    I: IntoIterator<Item = ShoppingListRow>,
{
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut items: Vec<ShoppingItem> = vec![];

    for row in rows {
        let key = (row.name, row.measurement_unit);
        match index.get(&key) {
            Some(&i) => items[i].amount += i64::from(row.amount),
            None => {
                index.insert(key.clone(), items.len());
                items.push(ShoppingItem {
                    name: key.0,
                    measurement_unit: key.1,
                    amount: row.amount.into(),
                });
            }
        }
    }

    items
}

pub fn render(items: &[ShoppingItem]) -> String {
    let mut s = format!("{SHOPPING_LIST_HEADER}\n");

    items.iter().for_each(|item| {
        s += &format!(
            "- {} ({}): {}\n",
            item.name, item.measurement_unit, item.amount
        );
    });

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn shared_ingredient_is_summed_across_recipes() {
        let rows = vec![
            row("Salt", "g", 5),
            row("Flour", "g", 200),
            row("Salt", "g", 3),
        ];

        let document = render(&aggregate(rows));

        assert!(document.contains("- Salt (g): 8\n"));
        assert!(document.contains("- Flour (g): 200\n"));
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let rows = vec![
            row("Milk", "ml", 100),
            row("Apple", "pcs", 2),
            row("Milk", "ml", 50),
        ];

        let items = aggregate(rows);

        assert_eq!(
            items,
            vec![
                ShoppingItem {
                    name: String::from("Milk"),
                    measurement_unit: String::from("ml"),
                    amount: 150
                },
                ShoppingItem {
                    name: String::from("Apple"),
                    measurement_unit: String::from("pcs"),
                    amount: 2
                },
            ]
        );
    }

    #[test]
    fn same_name_with_different_units_stays_separate() {
        let items = aggregate(vec![row("Sugar", "g", 10), row("Sugar", "tbsp", 1)]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn empty_cart_renders_header_only() {
        assert_eq!(render(&aggregate(vec![])), format!("{SHOPPING_LIST_HEADER}\n"));
    }

    #[test]
    fn large_totals_do_not_overflow() {
        let items = aggregate(vec![row("Water", "ml", i32::MAX), row("Water", "ml", i32::MAX)]);
        assert_eq!(items[0].amount, 2 * i64::from(i32::MAX));
    }
}
