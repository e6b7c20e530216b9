//! Demonstrates configuring the broker from a JSON document, pointing it at a mock issuer, and
//! signing a `wx.config` payload for a page URL.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use jsapi_broker::{config::BrokerConfig, flows::ReqwestBroker};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/token").query_param("grant_type", "client_credential");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-token\",\"expires_in\":7200}");
		})
		.await;
	let ticket_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/ticket/getticket").query_param("type", "jsapi");
			then.status(200).header("content-type", "application/json").body(
				"{\"errcode\":0,\"errmsg\":\"ok\",\"ticket\":\"demo-ticket\",\"expires_in\":7200}",
			);
		})
		.await;
	let config = BrokerConfig::from_value(json!({
		"apps": { "shop": { "appid": "wx-demo", "secret": "demo-secret" } },
		"endpoints": {
			"token": server.url("/cgi-bin/token"),
			"ticket": server.url("/cgi-bin/ticket/getticket")
		}
	}))?;
	let broker = ReqwestBroker::configure(&config).await?;
	let first = broker.try_jsapi_config("shop", "https://shop.example.com/cart#items").await?;
	let second = broker.try_jsapi_config("shop", "https://shop.example.com/checkout").await?;

	println!("first wx.config: {}", serde_json::to_string_pretty(&first)?);
	println!("second wx.config: {}", serde_json::to_string_pretty(&second)?);

	token_mock.assert_calls_async(1).await;
	ticket_mock.assert_calls_async(1).await;

	Ok(())
}
