//! Wires the access layer against a mock Nullbr server: bootstrap the store, gate a subject,
//! run a cached search inside a search session, and flush the metrics reporter.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use nullbr_access::{
	admin::AccessControl,
	client::NullbrClient,
	config::AccessConfig,
	http::ReqwestTransport,
	obs::AccessMetrics,
	reporter::MetricsReporter,
	session::SearchFilter,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("query", "matrix");
			then.status(200).json_body(json!({
				"page": 1,
				"items": [
					{ "media_type": "movie", "tmdbid": 603, "title": "The Matrix" },
					{ "media_type": "collection", "tmdbid": 2344, "title": "The Matrix Collection" },
				],
			}));
		})
		.await;
	let base_url = server.base_url();
	let config = AccessConfig::from_lookup(|key| match key {
		"NULLBR_BASE_URL" => Some(base_url.clone()),
		"X_APP_ID" => Some("demo-app".into()),
		"X_API_KEY" => Some("demo-key".into()),
		"ADMIN_ID" => Some("1000".into()),
		_ => None,
	})?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let rotator = Arc::new(config.rotator(store.clone()));
	let authorization = Arc::new(config.authorization_cache(store.clone()));
	let control = AccessControl::new(
		store,
		rotator.clone(),
		authorization.clone(),
		config.admin_subject.clone(),
	);

	control.bootstrap(config.static_credential.as_ref()).await?;

	let metrics = Arc::new(AccessMetrics::default());
	let reporter = config
		.metrics_report_interval
		.map(|period| MetricsReporter::spawn(metrics.clone(), period));
	let client = NullbrClient::from_config(
		&config,
		ReqwestTransport::with_timeout(config.api_timeout)?,
		rotator,
		metrics,
	)?;
	let sessions = config.session_store();

	if !authorization.is_authorized("1000").await {
		println!("Subject 1000 is not whitelisted.");

		return Ok(());
	}

	let token = sessions.create("matrix");

	for filter in [SearchFilter::All, SearchFilter::Movie] {
		let session = sessions
			.mutate(token.expose(), |session| {
				session.filter = filter;

				session.clone()
			})
			.ok_or_else(|| color_eyre::eyre::eyre!("Search session expired."))?;
		let page = client.search(&session.query, session.page).await?;
		let titles = page["items"]
			.as_array()
			.into_iter()
			.flatten()
			.filter(|item| item["media_type"].as_str().is_some_and(|kind| session.filter.admits(kind)))
			.filter_map(|item| item["title"].as_str())
			.collect::<Vec<_>>();

		println!("Filter {}: {titles:?}.", session.filter);
	}

	search_mock.assert_calls_async(1).await;

	let last = match reporter {
		Some(reporter) => reporter.shutdown().await?,
		None => client.metrics_snapshot(true),
	};

	println!(
		"Requests: {}, cache hits: {}, network calls: {}.",
		last.requests_total,
		last.cache_hits,
		last.network_calls(),
	);

	Ok(())
}
