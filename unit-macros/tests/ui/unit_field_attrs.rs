use unit_bus::arguments::ArgumentBag;
use unit_bus::marshal::Marshal;
use unit_bus::unit::Unit;
use unit_macros::unit;

#[unit(name = "CreateOrder", operation, job)]
#[derive(PartialEq)]
struct CreateOrder {
    #[unit(rename = "product_sku")]
    sku: String,
    #[unit(default)]
    quantity: u32,
    r#type: String,
}

fn main() {
    assert!(CreateOrder::CAPABILITIES.is_operation());
    assert!(CreateOrder::CAPABILITIES.is_job());
    assert!(!CreateOrder::CAPABILITIES.is_queueable());

    let names: Vec<&str> = CreateOrder::PARAMS.iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["product_sku", "quantity", "type"]);

    let args = ArgumentBag::new()
        .with("product_sku", "X1")
        .with("type", "retail");
    let order = CreateOrder::from_arguments(args).unwrap();
    assert_eq!(order.quantity, 0);
    assert_eq!(order.sku, "X1");

    let back = order.to_arguments().unwrap();
    assert_eq!(back.get("quantity"), Some(&serde_json::json!(0)));
    assert_eq!(CreateOrder::from_arguments(back).unwrap(), order);
}
