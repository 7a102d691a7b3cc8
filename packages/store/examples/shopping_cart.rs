//! A small shop: a product catalogue and a namespaced cart.
//!
//! Run with `cargo run -p statetree-store --example shopping_cart`.

use statetree_store::{
    ActionSubscriber, Error, ModuleDef, RegisterOptions, Store, StoreOptions, SubscribeOptions,
    Value,
};

fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

fn products() -> ModuleDef {
    ModuleDef::new()
        .namespaced(true)
        .state(json(serde_json::json!({"all": []})))
        .mutation("set_products", |state, products| {
            if let Some(all) = state.field_mut("all") {
                *all = products.clone();
            }
        })
        .mutation("decrement_inventory", |state, id| {
            let Some(all) = state.field_mut("all").and_then(Value::as_array_mut) else {
                return;
            };
            for product in all.iter_mut() {
                if product.field("id") == Some(id) {
                    if let Some(Value::Integer(n)) = product.field_mut("inventory") {
                        *n -= 1;
                    }
                }
            }
        })
        .action("load", |ctx, _| async move {
            // Stands in for a request to a product service.
            tokio::task::yield_now().await;
            ctx.commit(
                "set_products",
                json(serde_json::json!([
                    {"id": 1, "title": "Keyboard", "price": 45.0, "inventory": 2},
                    {"id": 2, "title": "Mouse", "price": 19.5, "inventory": 0},
                ])),
            );
            Ok(Value::Null)
        })
}

fn catalogue(root: &Value) -> Vec<Value> {
    root.field("products")
        .and_then(|products| products.field("all"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn cart() -> ModuleDef {
    ModuleDef::new()
        .namespaced(true)
        .state_fn(|| json(serde_json::json!({"items": [], "status": null})))
        .mutation("push_item", |state, id| {
            let mut item = json(serde_json::json!({"quantity": 1}));
            if let Some(fields) = item.as_map_mut() {
                fields.insert("id".to_string(), id.clone());
            }
            if let Some(items) = state.field_mut("items").and_then(Value::as_array_mut) {
                items.push(item);
            }
        })
        .mutation("set_status", |state, status| {
            if let Some(field) = state.field_mut("status") {
                *field = status.clone();
            }
        })
        .getter("total", |state, _, root, _| {
            let listed = catalogue(root);
            let total: f64 = state
                .field("items")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|item| {
                    let product = listed.iter().find(|p| p.field("id") == item.field("id"))?;
                    let price = product.field("price")?.as_f64()?;
                    Some(price * item.field("quantity")?.as_f64()?)
                })
                .sum();
            Value::from(total)
        })
        .action("add", |ctx, id| async move {
            let root = ctx.root_state();
            let in_stock = catalogue(&root)
                .iter()
                .find(|p| p.field("id") == Some(&id))
                .and_then(|p| p.field("inventory"))
                .and_then(Value::as_i64)
                .unwrap_or(0)
                > 0;
            if !in_stock {
                return Err(Error::action(format!("product {:?} is out of stock", id)));
            }
            ctx.commit("push_item", id.clone());
            ctx.commit_with(
                "products/decrement_inventory",
                id,
                statetree_store::CommitOptions::root(),
            );
            Ok(Value::Null)
        })
        .action("checkout", |ctx, _| async move {
            ctx.commit("set_status", "pending");
            tokio::task::yield_now().await;
            ctx.commit("set_status", "successful");
            Ok(ctx.getters().get("total").unwrap_or_default())
        })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let store = Store::new(
        StoreOptions::new(ModuleDef::new().module("products", products())).plugin(|store| {
            store.subscribe(
                |mutation, _| println!("mutation {} {:?}", mutation.kind, mutation.payload),
                SubscribeOptions::default(),
            );
        }),
    )?;
    store.subscribe_action(
        ActionSubscriber::new().error(|action, _, error| {
            println!("action {} failed: {}", action.kind, error);
            Ok(())
        }),
        SubscribeOptions::default(),
    );

    store.register_module("cart", cart(), RegisterOptions::default())?;
    store.dispatch("products/load", ()).await?;

    store.dispatch("cart/add", 1).await?;
    if let Err(e) = store.dispatch("cart/add", 2).await {
        println!("could not add: {}", e);
    }

    let total = store.dispatch("cart/checkout", ()).await?;
    println!("checked out, total {:?}", total);
    println!("final state {:?}", store.state());
    Ok(())
}
