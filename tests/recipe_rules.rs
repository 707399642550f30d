//! Exercises the crate's pure rule surface: payload validation, shopping
//! list aggregation, ingredient ranking and pagination math.

use recipeshare_sdk::actions::ingredients::rank_prefix_first;
use recipeshare_sdk::actions::recipes::RecipeFilter;
use recipeshare_sdk::actions::shopping_list::{aggregate, render_pdf};
use recipeshare_sdk::pagination::PageContext;
use recipeshare_sdk::schema::{
    CartIngredientRow, Ingredient, IngredientAmountPayload, RecipePayload,
};

fn base_payload() -> RecipePayload {
    RecipePayload {
        ingredients: vec![
            IngredientAmountPayload { id: 10, amount: 5 },
            IngredientAmountPayload { id: 11, amount: 3 },
        ],
        tags: vec![1],
        image: Some("data:image/jpeg;base64,aGVsbG8=".to_string()),
        name: "Pelmeni".to_string(),
        text: "Boil until they float".to_string(),
        cooking_time: 20,
    }
}

#[test]
fn recipe_with_repeated_ingredient_never_validates() {
    let mut payload = base_payload();
    payload
        .ingredients
        .push(IngredientAmountPayload { id: 10, amount: 1 });

    let err = payload.validate(true).unwrap_err();
    assert_eq!(err.field(), Some("ingredients"));
}

#[test]
fn cart_amounts_sum_across_recipes() {
    // recipe A brings 5 g of salt, recipe B another 3 g
    let rows = vec![
        CartIngredientRow {
            name: "Salt".to_string(),
            measurement_unit: "g".to_string(),
            amount: 5,
        },
        CartIngredientRow {
            name: "Flour".to_string(),
            measurement_unit: "g".to_string(),
            amount: 400,
        },
        CartIngredientRow {
            name: "Salt".to_string(),
            measurement_unit: "g".to_string(),
            amount: 3,
        },
    ];

    let items = aggregate(rows);
    let salt = items.iter().find(|i| i.name == "Salt").unwrap();
    assert_eq!(salt.amount, 8);
    assert_eq!(items.len(), 2);

    let pdf = render_pdf(&items).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn prefix_matches_outrank_containment() {
    let rows = vec![
        Ingredient {
            id: 1,
            name: "Сливки ванильные".to_string(),
            measurement_unit: "мл".to_string(),
        },
        Ingredient {
            id: 2,
            name: "Ванилин".to_string(),
            measurement_unit: "г".to_string(),
        },
    ];

    let ranked = rank_prefix_first(rows, "Ва");
    assert_eq!(ranked[0].id, 2);
    assert_eq!(ranked[1].id, 1);
}

#[test]
fn anonymous_membership_filters_yield_nothing() {
    let filter = RecipeFilter {
        is_favorited: Some(true),
        ..Default::default()
    };
    assert!(filter.requires_viewer());

    let ignored = RecipeFilter {
        is_favorited: Some(false),
        ..Default::default()
    };
    assert!(!ignored.requires_viewer());
}

#[test]
fn default_page_size_is_six() {
    let rows: Vec<i32> = (0..6).collect();
    let page = PageContext::from_rows(rows, 13, recipeshare_sdk::PAGE_SIZE, 1);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.next, Some(2));
}
