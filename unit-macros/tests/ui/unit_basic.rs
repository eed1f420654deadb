use unit_bus::marshal::Marshal;
use unit_bus::unit::Unit;
use unit_macros::unit;

#[unit(name = "SendEmail", queueable)]
struct SendEmail {
    to: String,
    cc: Option<String>,
}

#[unit]
struct Heartbeat;

fn main() {
    assert_eq!(SendEmail::NAME, "SendEmail");
    assert!(SendEmail::CAPABILITIES.is_queueable());
    assert!(!SendEmail::CAPABILITIES.is_operation());
    assert_eq!(SendEmail::PARAMS.len(), 2);
    assert!(SendEmail::PARAMS[0].required);
    assert!(!SendEmail::PARAMS[1].required);

    // Debug/Clone 由宏派生
    let mail = SendEmail {
        to: "a@x.com".into(),
        cc: None,
    };
    let _ = format!("{:?}", mail.clone());

    assert_eq!(Heartbeat::NAME, "Heartbeat");
    assert!(Heartbeat::PARAMS.is_empty());
    let _ = Heartbeat::from_arguments(Default::default()).unwrap();
}
