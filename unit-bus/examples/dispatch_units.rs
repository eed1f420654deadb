use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use unit_bus::arguments::{ArgumentBag, Arguments, RequestInput};
use unit_bus::context::{AppContext, BusinessContext};
use unit_bus::error::AppError;
use unit_bus::unit_handler::UnitHandler;
use unit_bus::{Dispatcher, InMemoryEventPublisher, InMemoryExecutor, Marshaller};
use unit_macros::unit;

#[unit(name = "RegisterUser", operation)]
struct RegisterUser {
    name: String,
    email: String,
}

#[unit(name = "SendWelcomeMail", queueable, job)]
struct SendWelcomeMail {
    email: String,
}

struct RegisterUserHandler;

#[async_trait]
impl UnitHandler<RegisterUser> for RegisterUserHandler {
    type Output = u64;

    async fn handle(&self, _ctx: &AppContext, unit: RegisterUser) -> Result<u64, AppError> {
        println!("RegisterUser: name={}, email={}", unit.name, unit.email);
        Ok(42)
    }
}

struct SendWelcomeMailHandler;

#[async_trait]
impl UnitHandler<SendWelcomeMail> for SendWelcomeMailHandler {
    type Output = ();

    async fn handle(&self, _ctx: &AppContext, unit: SendWelcomeMail) -> Result<(), AppError> {
        println!("SendWelcomeMail: email={}", unit.email);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let marshaller = Arc::new(Marshaller::new());
    marshaller.register::<RegisterUser>()?;
    marshaller.register::<SendWelcomeMail>()?;

    let executor = Arc::new(InMemoryExecutor::new());
    executor.register::<RegisterUser, _>(Arc::new(RegisterUserHandler))?;
    executor.register::<SendWelcomeMail, _>(Arc::new(SendWelcomeMailHandler))?;

    let publisher = InMemoryEventPublisher::default();
    let mut events = publisher.subscribe();

    let dispatcher = Dispatcher::builder()
        .marshaller(marshaller)
        .executor(executor.clone())
        .publisher(Arc::new(publisher))
        .build();

    let ctx = AppContext {
        biz: BusinessContext::builder()
            .correlation_id("cor-1".to_string())
            .actor_type("user".to_string())
            .actor_id("u-1".to_string())
            .build(),
        idempotency_key: Some("idem-1".into()),
    };

    // 请求源 + 额外参数：email 取自请求，name 回退到 extra
    let request = RequestInput::new().with_body(ArgumentBag::try_from(json!({
        "email": "alice@example.com"
    }))?);
    let out = dispatcher
        .run(
            &ctx,
            "RegisterUser",
            request,
            ArgumentBag::new().with("name", "Alice"),
        )
        .await?;
    println!("RegisterUser -> {out:?}");

    // 已构造实例，入队执行
    let out = dispatcher
        .run(
            &ctx,
            SendWelcomeMail {
                email: "alice@example.com".into(),
            },
            Arguments::none(),
            ArgumentBag::new(),
        )
        .await?;
    println!("SendWelcomeMail -> {out:?}");

    // 位置参数 + 指定队列
    dispatcher
        .run_in_queue(&ctx, "SendWelcomeMail", vec![json!("bob@example.com")], Some("mail"))
        .await?;

    executor.wait_idle().await;

    while let Ok(ev) = events.try_recv() {
        println!("event: {:?} unit={} args={}", ev.kind, ev.unit, ev.arguments);
    }

    // 缺少必填参数 -> Construction 错误
    if let Err(AppError::Construction { unit, param }) = dispatcher
        .run(&ctx, "RegisterUser", ArgumentBag::new(), ArgumentBag::new())
        .await
    {
        eprintln!("Construction error as expected: unit={unit}, param={param}");
    }

    Ok(())
}
