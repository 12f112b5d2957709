mod common;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serial_test::serial;
use storefront_api::{
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    entity::{CartItems, Carts, Products, cart_items, carts, products},
    error::AppError,
    middleware::auth::Principal,
    models::{Cart, MAX_LINE_QUANTITY},
    services::{cart_service, product_service},
    state::AppState,
};

use common::{admin, create_customer, create_product, customer_id, setup_state};

fn assert_total_matches_items(cart: &Cart) {
    let expected: i64 = cart
        .items
        .iter()
        .map(|item| item.unit_price * i64::from(item.quantity))
        .sum();
    assert_eq!(cart.total_amount, expected);
}

async fn stored_total(state: &AppState, cart_id: i64) -> anyhow::Result<i64> {
    let cart = Carts::find_by_id(cart_id)
        .one(&state.orm)
        .await?
        .expect("cart row");
    Ok(cart.total_amount)
}

#[tokio::test]
#[serial]
async fn cart_total_tracks_every_mutation() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "ann@example.com").await?;
    let mug = create_product(&state, "Mug", 100, None).await?;
    let shirt = create_product(&state, "Shirt", 250, None).await?;

    let cart = cart_service::get_cart(&state, &customer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);

    let cart = cart_service::add_item(
        &state,
        &customer,
        AddCartItemRequest {
            product_id: mug,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_total_matches_items(&cart);
    assert_eq!(stored_total(&state, cart.id).await?, 200);

    let cart = cart_service::add_item(
        &state,
        &customer,
        AddCartItemRequest {
            product_id: shirt,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.total_amount, 450);
    assert_eq!(stored_total(&state, cart.id).await?, 450);

    let shirt_line = cart.items.iter().find(|i| i.product_id == shirt).unwrap().id;
    let cart = cart_service::update_item_quantity(
        &state,
        &customer,
        shirt_line,
        UpdateCartItemRequest { quantity: 4 },
    )
    .await?
    .data
    .unwrap();
    assert_total_matches_items(&cart);
    assert_eq!(cart.total_amount, 1200);
    assert_eq!(stored_total(&state, cart.id).await?, 1200);

    let mug_line = cart.items.iter().find(|i| i.product_id == mug).unwrap().id;
    let cart = cart_service::delete_item(&state, &customer, mug_line)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_amount, 1000);
    assert_eq!(stored_total(&state, cart.id).await?, 1000);

    let cart = cart_service::clear_cart(&state, &customer).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_amount, 0);
    assert_eq!(stored_total(&state, cart.id).await?, 0);

    Ok(())
}

#[tokio::test]
#[serial]
async fn adding_same_product_merges_into_one_line() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "ann@example.com").await?;
    let product = create_product(&state, "Mug", 100, None).await?;

    for quantity in [2, 3] {
        cart_service::add_item(
            &state,
            &customer,
            AddCartItemRequest {
                product_id: product,
                quantity,
            },
        )
        .await?;
    }

    let cart = cart_service::get_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.items[0].subtotal, 500);
    assert_eq!(cart.total_amount, 500);
    assert_eq!(
        cart.items[0].product.as_ref().map(|p| p.name.as_str()),
        Some("Mug")
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn concurrent_adds_sum_quantities() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "ann@example.com").await?;
    let product = create_product(&state, "Mug", 100, None).await?;

    let add = |state: AppState, customer: Principal| async move {
        cart_service::add_item(
            &state,
            &customer,
            AddCartItemRequest {
                product_id: product,
                quantity: 1,
            },
        )
        .await
    };
    let (first, second) = tokio::join!(
        tokio::spawn(add(state.clone(), customer.clone())),
        tokio::spawn(add(state.clone(), customer.clone())),
    );
    first??;
    second??;

    let carts = Carts::find()
        .filter(carts::Column::CustomerId.eq(customer_id(&customer)))
        .count(&state.orm)
        .await?;
    assert_eq!(carts, 1);

    let lines = CartItems::find()
        .filter(cart_items::Column::ProductId.eq(product))
        .all(&state.orm)
        .await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);

    let cart = cart_service::get_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.total_amount, 200);

    Ok(())
}

#[tokio::test]
#[serial]
async fn touching_a_line_refreshes_its_price_snapshot() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "ann@example.com").await?;
    let product = create_product(&state, "Mug", 100, None).await?;

    let cart = cart_service::add_item(
        &state,
        &customer,
        AddCartItemRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    let line = cart.items[0].id;

    let mut active: products::ActiveModel = Products::find_by_id(product)
        .one(&state.orm)
        .await?
        .expect("product")
        .into();
    active.price = Set(150);
    active.name = Set("Big Mug".into());
    active.update(&state.orm).await?;

    let cart = cart_service::update_item_quantity(
        &state,
        &customer,
        line,
        UpdateCartItemRequest { quantity: 2 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items[0].unit_price, 150);
    assert_eq!(cart.items[0].product_name, "Big Mug");
    assert_eq!(cart.total_amount, 300);

    Ok(())
}

#[tokio::test]
#[serial]
async fn foreign_and_missing_lines_are_not_found() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let ann = create_customer(&state, "ann@example.com").await?;
    let bob = create_customer(&state, "bob@example.com").await?;
    let product = create_product(&state, "Mug", 100, None).await?;

    let cart = cart_service::add_item(
        &state,
        &ann,
        AddCartItemRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    let anns_line = cart.items[0].id;

    let err = cart_service::update_item_quantity(
        &state,
        &bob,
        anns_line,
        UpdateCartItemRequest { quantity: 3 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = cart_service::delete_item(&state, &bob, anns_line).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = cart_service::add_item(
        &state,
        &ann,
        AddCartItemRequest {
            product_id: 9_999,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Product")));

    let err = cart_service::add_item(
        &state,
        &ann,
        AddCartItemRequest {
            product_id: product,
            quantity: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::get_cart(&state, &ann).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 1);
    assert_eq!(cart.total_amount, 100);

    Ok(())
}

#[tokio::test]
#[serial]
async fn deleting_a_product_recomputes_cart_totals() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let ann = create_customer(&state, "ann@example.com").await?;
    let bob = create_customer(&state, "bob@example.com").await?;
    let mug = create_product(&state, "Mug", 100, None).await?;
    let shirt = create_product(&state, "Shirt", 250, None).await?;

    for (customer, product, quantity) in [(&ann, mug, 2), (&ann, shirt, 1), (&bob, mug, 3)] {
        cart_service::add_item(
            &state,
            customer,
            AddCartItemRequest {
                product_id: product,
                quantity,
            },
        )
        .await?;
    }

    product_service::delete_product(&state, &admin(), mug).await?;

    let anns = cart_service::get_cart(&state, &ann).await?.data.unwrap();
    assert_eq!(anns.items.len(), 1);
    assert_eq!(anns.total_amount, 250);
    assert_eq!(stored_total(&state, anns.id).await?, 250);

    let bobs = cart_service::get_cart(&state, &bob).await?.data.unwrap();
    assert!(bobs.items.is_empty());
    assert_eq!(stored_total(&state, bobs.id).await?, 0);

    Ok(())
}

#[tokio::test]
#[serial]
async fn merged_quantity_is_bounded() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let customer = create_customer(&state, "ann@example.com").await?;
    let product = create_product(&state, "Mug", 100, None).await?;

    cart_service::add_item(
        &state,
        &customer,
        AddCartItemRequest {
            product_id: product,
            quantity: MAX_LINE_QUANTITY,
        },
    )
    .await?;

    for quantity in [1, 2_000_000_000] {
        let err = cart_service::add_item(
            &state,
            &customer,
            AddCartItemRequest {
                product_id: product,
                quantity,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    let cart = cart_service::get_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
    assert_eq!(stored_total(&state, cart.id).await?, 100 * i64::from(MAX_LINE_QUANTITY));

    Ok(())
}
