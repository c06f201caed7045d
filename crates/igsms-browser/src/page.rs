//! A single browser tab driven over CDP.

use async_trait::async_trait;
use base64::Engine;
use igsms_core::{error::IgsmsError, traits::PageDriver};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::cdp::CdpConnection;
use crate::keys;

/// Poll interval for selector and navigation waits.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on a single navigation.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Set on the old document before navigating; its absence means the new
/// document has replaced it.
const NAV_MARKER: &str = "window.__igsmsNav";

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Unwrap a `Runtime.evaluate` reply into the returned value.
pub(crate) fn evaluate_result(reply: Value) -> Result<Value, IgsmsError> {
    if let Some(details) = reply.get("exceptionDetails") {
        let description = details
            .pointer("/exception/description")
            .and_then(Value::as_str)
            .or_else(|| details.get("text").and_then(Value::as_str))
            .unwrap_or("script threw");
        return Err(IgsmsError::Browser(format!("script error: {description}")));
    }
    Ok(reply
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// Script collecting the visible text of multi-line `div`s under `root`.
pub(crate) fn multiline_texts_script(root: &str, limit: usize) -> String {
    format!(
        r#"(() => {{
  const root = document.querySelector({root});
  if (!root) return [];
  const texts = Array.from(root.querySelectorAll('div'))
    .map(d => d.innerText || '')
    .filter(t => t.includes('\n'));
  return texts.slice(-{limit});
}})()"#,
        root = js_string(root),
    )
}

/// CDP-backed implementation of [`PageDriver`].
pub struct CdpPage {
    conn: CdpConnection,
}

impl CdpPage {
    /// Attach to a page target and apply viewport and user agent.
    pub async fn attach(
        ws_url: &str,
        viewport: (u32, u32),
        user_agent: &str,
    ) -> Result<Self, IgsmsError> {
        let conn = CdpConnection::connect(ws_url).await?;
        conn.call("Page.enable", json!({})).await?;
        conn.call("Runtime.enable", json!({})).await?;
        conn.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.0,
                "height": viewport.1,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;
        if !user_agent.is_empty() {
            conn.call(
                "Network.setUserAgentOverride",
                json!({ "userAgent": user_agent }),
            )
            .await?;
        }
        Ok(Self { conn })
    }

    /// Whether the underlying socket has dropped.
    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    /// Evaluate an expression and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, IgsmsError> {
        let reply = self
            .conn
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        evaluate_result(reply)
    }

    async fn wait_for_new_document(&self) -> Result<(), IgsmsError> {
        let probe = format!("!{NAV_MARKER} && document.readyState !== 'loading'");
        let deadline = Instant::now() + NAVIGATION_TIMEOUT;
        loop {
            // The context is torn down mid-navigation; errors mean "not yet".
            if let Ok(Value::Bool(true)) = self.evaluate(&probe).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(IgsmsError::Browser(format!(
                    "navigation not ready after {}s",
                    NAVIGATION_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&self, url: &str) -> Result<(), IgsmsError> {
        debug!("navigating to {url}");
        if let Err(e) = self.evaluate(&format!("{NAV_MARKER} = true")).await {
            debug!("could not mark current document: {e}");
        }

        let reply = self.conn.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(err) = reply
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Err(IgsmsError::Browser(format!("navigate to {url}: {err}")));
        }

        // Same-document navigations (fragment changes) carry no loader.
        if reply.get("loaderId").is_none() {
            return Ok(());
        }
        self.wait_for_new_document().await
    }

    async fn url(&self) -> Result<String, IgsmsError> {
        let value = self.evaluate("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, IgsmsError> {
        let probe = format!("document.querySelector({}) !== null", js_string(selector));
        let deadline = Instant::now() + timeout;
        loop {
            match self.evaluate(&probe).await {
                Ok(Value::Bool(true)) => return Ok(true),
                Ok(_) => {}
                Err(e) => debug!("selector probe failed: {e}"),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn multiline_texts(
        &self,
        root: &str,
        limit: usize,
    ) -> Result<Vec<String>, IgsmsError> {
        let value = self.evaluate(&multiline_texts_script(root, limit)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, IgsmsError> {
        let reply = self
            .conn
            .call("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = reply
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| IgsmsError::Browser("screenshot returned no data".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| IgsmsError::Browser(format!("screenshot decode: {e}")))
    }

    async fn click(&self, x: f64, y: f64) -> Result<(), IgsmsError> {
        for kind in ["mousePressed", "mouseReleased"] {
            self.conn
                .call(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": kind,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), IgsmsError> {
        self.conn
            .call("Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), IgsmsError> {
        let def = keys::lookup(key)
            .ok_or_else(|| IgsmsError::Browser(format!("unknown key {key:?}")))?;
        self.conn
            .call("Input.dispatchKeyEvent", def.down_params())
            .await?;
        self.conn
            .call("Input.dispatchKeyEvent", def.up_params())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_result_value() {
        let reply = json!({"result": {"type": "string", "value": "https://x/"}});
        assert_eq!(evaluate_result(reply).unwrap(), json!("https://x/"));
    }

    #[test]
    fn test_evaluate_result_undefined_is_null() {
        let reply = json!({"result": {"type": "undefined"}});
        assert_eq!(evaluate_result(reply).unwrap(), Value::Null);
    }

    #[test]
    fn test_evaluate_result_exception() {
        let reply = json!({
            "result": {"type": "object"},
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "SyntaxError: bad selector"}
            }
        });
        let err = evaluate_result(reply).unwrap_err();
        assert!(err.to_string().contains("SyntaxError: bad selector"));
    }

    #[test]
    fn test_evaluate_result_exception_without_description() {
        let reply = json!({"exceptionDetails": {"text": "Uncaught"}});
        let err = evaluate_result(reply).unwrap_err();
        assert!(err.to_string().contains("Uncaught"));
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("[role='main']"), r#""[role='main']""#);
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn test_multiline_script_embeds_root_and_limit() {
        let script = multiline_texts_script("[role='main']", 10);
        assert!(script.contains(r#"document.querySelector("[role='main']")"#));
        assert!(script.contains("slice(-10)"));
        assert!(script.contains(r"includes('\n')"));
    }
}
