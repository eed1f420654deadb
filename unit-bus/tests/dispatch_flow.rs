use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unit_bus::arguments::{ArgumentBag, Arguments, RequestInput};
use unit_bus::context::{AppContext, BusinessContext};
use unit_bus::error::AppError;
use unit_bus::event::UnitEventKind;
use unit_bus::inmemory_executor::{InMemoryExecutorConfig, QueueMode};
use unit_bus::unit_handler::UnitHandler;
use unit_bus::{
    Dispatched, Dispatcher, InMemoryEventPublisher, InMemoryExecutor, InMemoryMockRegistry,
    Marshaller,
};
use unit_macros::unit;

#[unit(name = "SendEmail", queueable, job)]
struct SendEmail {
    to: String,
    subject: Option<String>,
}

#[unit(name = "PlaceOrder", operation)]
struct PlaceOrder {
    sku: String,
    #[unit(default)]
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct Receipt {
    sku: String,
    total: u32,
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl UnitHandler<SendEmail> for Outbox {
    type Output = ();

    async fn handle(&self, _ctx: &AppContext, unit: SendEmail) -> Result<(), AppError> {
        if unit.to.is_empty() {
            return Err(AppError::Validation("empty recipient".into()));
        }
        self.sent.lock().unwrap().push(unit.to);
        Ok(())
    }
}

#[derive(Default)]
struct Orders {
    placed: AtomicUsize,
}

#[async_trait]
impl UnitHandler<PlaceOrder> for Orders {
    type Output = Receipt;

    async fn handle(&self, _ctx: &AppContext, unit: PlaceOrder) -> Result<Receipt, AppError> {
        self.placed.fetch_add(1, Ordering::SeqCst);
        Ok(Receipt {
            total: unit.quantity * 10,
            sku: unit.sku,
        })
    }
}

struct App {
    dispatcher: Dispatcher,
    executor: Arc<InMemoryExecutor>,
    publisher: InMemoryEventPublisher,
    outbox: Arc<Outbox>,
    orders: Arc<Orders>,
}

fn app(config: InMemoryExecutorConfig, mocks: Option<Arc<InMemoryMockRegistry>>) -> App {
    let marshaller = Arc::new(Marshaller::new());
    marshaller.register::<SendEmail>().unwrap();
    marshaller.register::<PlaceOrder>().unwrap();

    let outbox = Arc::new(Outbox::default());
    let orders = Arc::new(Orders::default());
    let executor = Arc::new(InMemoryExecutor::with_config(config));
    executor
        .register::<SendEmail, _>(outbox.clone())
        .unwrap();
    executor
        .register::<PlaceOrder, _>(orders.clone())
        .unwrap();

    let publisher = InMemoryEventPublisher::new(16);
    let dispatcher = Dispatcher::builder()
        .marshaller(marshaller)
        .executor(executor.clone())
        .publisher(Arc::new(publisher.clone()))
        .maybe_mocks(mocks.map(|m| m as Arc<dyn unit_bus::mock::MockRegistry>))
        .build();

    App {
        dispatcher,
        executor,
        publisher,
        outbox,
        orders,
    }
}

fn bag(value: serde_json::Value) -> ArgumentBag {
    ArgumentBag::try_from(value).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_operation_returns_handler_output_and_announces_it() {
    let app = app(InMemoryExecutorConfig::default(), None);
    let mut events = app.publisher.subscribe();
    let ctx = AppContext {
        biz: BusinessContext::builder()
            .correlation_id("cor-1".to_string())
            .build(),
        ..Default::default()
    };

    let out = app
        .dispatcher
        .run(
            &ctx,
            "PlaceOrder",
            bag(json!({"sku": "A-1", "quantity": 3})),
            ArgumentBag::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.output(), Some(&json!({"sku": "A-1", "total": 30})));
    assert_eq!(app.orders.placed.load(Ordering::SeqCst), 1);

    let ev = events.recv().await.unwrap();
    assert_eq!(ev.kind, UnitEventKind::OperationStarted);
    assert_eq!(ev.unit, "PlaceOrder");
    assert_eq!(ev.biz.correlation_id(), Some("cor-1"));
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_job_runs_on_worker_after_enqueue() {
    let app = app(InMemoryExecutorConfig::default(), None);
    let mut events = app.publisher.subscribe();
    let ctx = AppContext::default();

    let out = app
        .dispatcher
        .run(
            &ctx,
            SendEmail {
                to: "a@x.com".into(),
                subject: None,
            },
            Arguments::none(),
            ArgumentBag::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        out,
        Dispatched::Queued {
            queue: "default".into()
        }
    );

    app.executor.wait_idle().await;
    assert_eq!(*app.outbox.sent.lock().unwrap(), vec!["a@x.com".to_string()]);

    let ev = events.recv().await.unwrap();
    assert_eq!(ev.kind, UnitEventKind::JobStarted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_async_with_inline_queue_still_returns_unit() {
    let app = app(
        InMemoryExecutorConfig {
            mode: QueueMode::Inline,
            ..Default::default()
        },
        None,
    );
    let ctx = AppContext::default();

    let () = app
        .dispatcher
        .run_async(
            &ctx,
            "PlaceOrder",
            RequestInput::new().with_body(bag(json!({"sku": "B-2"}))),
            ArgumentBag::new(),
        )
        .await
        .unwrap();

    // 内联队列在返回前已执行
    assert_eq!(app.orders.placed.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_failures_do_not_reach_the_caller() {
    let app = app(InMemoryExecutorConfig::default(), None);
    let ctx = AppContext::default();

    app.dispatcher
        .run_in_queue(&ctx, "SendEmail", vec![json!("")], Some("mail"))
        .await
        .unwrap();
    app.dispatcher
        .run_in_queue(&ctx, "SendEmail", vec![json!("b@x.com"), json!("hi")], Some("mail"))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), app.executor.wait_idle())
        .await
        .unwrap();
    assert_eq!(*app.outbox.sent.lock().unwrap(), vec!["b@x.com".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mocked_unit_is_substituted_before_execution() {
    let mocks = Arc::new(InMemoryMockRegistry::new());
    let mock = mocks
        .expect_instance(&PlaceOrder {
            sku: "M-1".into(),
            quantity: 2,
        })
        .unwrap();
    let app = app(InMemoryExecutorConfig::default(), Some(mocks));
    let ctx = AppContext::default();

    let out = app
        .dispatcher
        .run(
            &ctx,
            PlaceOrder {
                sku: "M-1".into(),
                quantity: 2,
            },
            Arguments::none(),
            ArgumentBag::new(),
        )
        .await
        .unwrap();
    assert_eq!(out.output(), Some(&json!({"sku": "M-1", "total": 20})));
    assert_eq!(mock.times_matched(), 1);

    let err = app
        .dispatcher
        .run(
            &ctx,
            PlaceOrder {
                sku: "M-1".into(),
                quantity: 9,
            },
            Arguments::none(),
            ArgumentBag::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MockMismatch { .. }));
    assert_eq!(app.orders.placed.load(Ordering::SeqCst), 1);
}
