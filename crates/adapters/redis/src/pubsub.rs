//! Redis 订阅模块
//!
//! 实体变更事件通过 Redis Pub/Sub 投递，本模块负责订阅与逐条分发。

use bastion_errors::{AppError, AppResult};
use futures::StreamExt;
use redis::Client;
use tracing::{debug, error, info};

/// 收到的消息
#[derive(Debug, Clone)]
pub struct PubSubMessage {
    /// 频道
    pub channel: String,
    /// 消息内容
    pub payload: String,
    /// 接收时间
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl PubSubMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            received_at: chrono::Utc::now(),
        }
    }
}

/// Redis 订阅者
pub struct RedisSubscriber {
    client: Client,
    key_prefix: Option<String>,
}

impl RedisSubscriber {
    /// 创建新的订阅者
    pub fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::internal(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            key_prefix: None,
        })
    }

    /// 设置键前缀
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// 获取带前缀的频道名
    pub fn prefixed_channel(&self, channel: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, channel),
            None => channel.to_string(),
        }
    }

    /// 订阅频道并按顺序处理消息
    ///
    /// 处理函数返回的错误只记录日志，不会中断订阅。
    pub async fn subscribe<F, Fut>(&self, channels: &[&str], mut handler: F) -> AppResult<()>
    where
        F: FnMut(PubSubMessage) -> Fut + Send,
        Fut: std::future::Future<Output = AppResult<()>> + Send,
    {
        let prefixed_channels: Vec<String> = channels
            .iter()
            .map(|c| self.prefixed_channel(c))
            .collect();

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| AppError::internal(format!("Failed to get pubsub connection: {}", e)))?;

        for channel in &prefixed_channels {
            pubsub.subscribe(channel).await.map_err(|e| {
                AppError::internal(format!("Failed to subscribe to {}: {}", channel, e))
            })?;
        }

        info!(channels = ?prefixed_channels, "Subscribed to channels");

        let mut stream = pubsub.on_message();

        while let Some(msg) = stream.next().await {
            let channel: String = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    error!(error = %e, "Failed to get message payload");
                    continue;
                }
            };

            debug!(channel = %channel, bytes = payload.len(), "Message received");
            let message = PubSubMessage::new(channel.clone(), payload);

            if let Err(e) = handler(message).await {
                error!(channel = %channel, error = %e, "Failed to handle message");
            }
        }

        info!("Pub/Sub stream closed");
        Ok(())
    }
}
