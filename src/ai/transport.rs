//! HTTP 传输层
//!
//! 采集流程运行在普通线程上，这里持有一个私有的单线程 tokio 运行时，
//! 在其上执行异步 `reqwest` 请求并 `block_on` 等待结果。
//! 每次请求都套一层 `tokio::time::timeout`，网络不可达时不会无限挂起。

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tokio::runtime::Runtime;

use super::AiError;

pub struct HttpTransport {
    runtime: Runtime,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, AiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AiError::Network(format!("创建运行时失败: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AiError::Network(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            runtime,
            client,
            timeout,
        })
    }

    /// POST JSON 并解析 JSON 回复；非 2xx 状态映射为 `AiError::Status`
    pub fn post_json(&self, url: &str, headers: HeaderMap, body: &Value) -> Result<Value, AiError> {
        let request = self.client.post(url).headers(headers).json(body);
        let timeout = self.timeout;

        self.runtime.block_on(async move {
            let response = tokio::time::timeout(timeout, request.send())
                .await
                .map_err(|_| AiError::Timeout(timeout))?
                .map_err(map_reqwest_error)?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(AiError::Status(status.as_u16(), truncate_for_log(&body_text)));
            }

            tokio::time::timeout(timeout, response.json::<Value>())
                .await
                .map_err(|_| AiError::Timeout(timeout))?
                .map_err(|e| AiError::Malformed(e.to_string()))
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> AiError {
    if err.is_timeout() {
        AiError::Network(format!("请求超时: {}", err))
    } else {
        AiError::Network(err.to_string())
    }
}

fn truncate_for_log(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let mut head: String = text.chars().take(LIMIT).collect();
    head.push('…');
    head
}
