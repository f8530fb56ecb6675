use alarm_api::notifier::{notify, MqttPublisher, NotifierConfig};
use alarm_shared::AlarmMessage;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alarm_api=debug,alarm_notifier=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = NotifierConfig::from_env()?;
    let publisher = MqttPublisher::new(&config);

    tracing::info!(device_id = %config.device_id, "Alarm notifier ready");

    run(service_fn(|event: LambdaEvent<AlarmMessage>| {
        let publisher = &publisher;
        let device_id = config.device_id.as_str();
        async move {
            tracing::info!(
                request_id = %event.context.request_id,
                event_id = %event.payload.event_id,
                "Alarm triggered"
            );
            notify(publisher, device_id, &event.payload)
                .await
                .map_err(|e| Error::from(format!("{:#}", e)))
        }
    }))
    .await
}
