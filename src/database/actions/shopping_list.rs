use std::collections::HashMap;

use printpdf::{BuiltinFont, Mm, PdfDocument};
use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::{CartIngredientRow, Uuid},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Every ingredient row of every recipe currently in the user's cart, in a
/// deterministic recipe-then-ingredient order.
pub async fn list_cart_ingredients(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredientRow>, ApiError> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        ORDER BY sc.recipe_id, i.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Groups by (name, unit) and sums amounts, keeping first-encountered order.
pub fn aggregate(rows: Vec<CartIngredientRow>) -> Vec<ShoppingListItem> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut items: Vec<ShoppingListItem> = Vec::new();

    for row in rows {
        let key = (row.name.to_owned(), row.measurement_unit.to_owned());
        match index.get(&key) {
            Some(&i) => items[i].amount += row.amount as i64,
            None => {
                index.insert(key, items.len());
                items.push(ShoppingListItem {
                    name: row.name,
                    measurement_unit: row.measurement_unit,
                    amount: row.amount as i64,
                });
            }
        }
    }

    items
}

/// Renders "index. name – amount unit" lines under a header, starting a new
/// page whenever the cursor reaches the bottom margin. An empty item list
/// still yields a document with the header.
pub fn render_pdf(items: &[ShoppingListItem]) -> Result<Vec<u8>, ApiError> {
    // A4 portrait, line grid in millimetres
    let (doc, page, layer) = PdfDocument::new("Shopping list", Mm(210.0), Mm(297.0), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ApiError::Internal(format!("Failed to load document font: {e}")))?;

    let mut layer = doc.get_page(page).get_layer(layer);
    layer.use_text("Shopping list", 16.0, Mm(25.0), Mm(280.0), &font);

    let mut y = 272.0;
    for (i, item) in items.iter().enumerate() {
        if y < 20.0 {
            let (page, new_layer) = doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
            layer = doc.get_page(page).get_layer(new_layer);
            y = 272.0;
        }
        let line = format!(
            "{}. {} – {} {}",
            i + 1,
            item.name,
            item.amount,
            item.measurement_unit
        );
        layer.use_text(line, 12.0, Mm(25.0), Mm(y), &font);
        y -= 8.0;
    }

    doc.save_to_bytes()
        .map_err(|e| ApiError::Internal(format!("Failed to render document: {e}")))
}

pub async fn export_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<u8>, ApiError> {
    let rows = list_cart_ingredients(user_id, pool).await?;
    render_pdf(&aggregate(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn amounts_are_summed_per_ingredient() {
        let items = aggregate(vec![row("Salt", "g", 5), row("Sugar", "g", 2), row("Salt", "g", 3)]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Salt");
        assert_eq!(items[0].amount, 8);
        assert_eq!(items[1].name, "Sugar");
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let items = aggregate(vec![row("Milk", "ml", 200), row("Milk", "g", 50)]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn first_encountered_order_is_kept() {
        let items = aggregate(vec![
            row("C", "g", 1),
            row("A", "g", 1),
            row("B", "g", 1),
            row("A", "g", 1),
        ]);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn empty_cart_aggregates_to_nothing() {
        assert!(aggregate(vec![]).is_empty());
    }

    #[test]
    fn renders_a_pdf_document() {
        let items = vec![ShoppingListItem {
            name: "Salt".to_string(),
            measurement_unit: "g".to_string(),
            amount: 8,
        }];
        let bytes = render_pdf(&items).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_list_still_renders_a_header_page() {
        let bytes = render_pdf(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_lists_spill_onto_more_pages() {
        let items: Vec<ShoppingListItem> = (0..100)
            .map(|i| ShoppingListItem {
                name: format!("Ingredient {i}"),
                measurement_unit: "g".to_string(),
                amount: i + 1,
            })
            .collect();
        let bytes = render_pdf(&items).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > render_pdf(&[]).unwrap().len());
    }
}
