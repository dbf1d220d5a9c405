use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    CookieJarCredentials, HttpPriceService, PriceForm, PriceLookupConfig, PriceLookupController,
};
use reqwest::{header::SET_COOKIE, StatusCode};
use shared::{
    domain::ProductId,
    protocol::{product_page_route, ProductPage},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "PRICE_SERVER_URL", default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long)]
    product_id: String,
    /// Overrides the price endpoint path for every request.
    #[arg(long, env = "PRICE_ENDPOINT")]
    price_endpoint: Option<String>,
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,
    #[arg(long, default_value = "₹")]
    currency: String,
    /// Render whichever response arrives last, even from an older request.
    #[arg(long)]
    keep_stale_responses: bool,
}

impl Args {
    fn lookup_config(&self) -> PriceLookupConfig {
        PriceLookupConfig {
            endpoint_override: self.price_endpoint.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
            currency_symbol: self.currency.clone(),
            discard_stale_responses: !self.keep_stale_responses,
        }
    }
}

/// Terminal rendition of the product page form: controls live in memory, the
/// result and error areas print as they change.
struct TerminalForm {
    product_id: Option<ProductId>,
    quantity: Mutex<String>,
    unit: Mutex<String>,
}

impl TerminalForm {
    fn new(page: Option<&ProductPage>) -> Self {
        Self {
            product_id: page.map(|page| page.product_id.clone()),
            quantity: Mutex::new(
                page.map(|page| page.default_quantity.clone())
                    .unwrap_or_default(),
            ),
            unit: Mutex::new(
                page.map(|page| page.default_unit.to_string())
                    .unwrap_or_default(),
            ),
        }
    }

    fn set_quantity(&self, value: &str) {
        *self.quantity.lock().unwrap_or_else(PoisonError::into_inner) = value.to_string();
    }

    fn set_unit(&self, value: &str) {
        *self.unit.lock().unwrap_or_else(PoisonError::into_inner) = value.to_string();
    }
}

impl PriceForm for TerminalForm {
    fn product_id(&self) -> Option<ProductId> {
        self.product_id.clone()
    }

    fn quantity(&self) -> String {
        self.quantity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn unit(&self) -> String {
        self.unit.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn show_total(&self, text: &str) {
        println!("total: {text}");
    }

    fn show_error(&self, text: &str) {
        eprintln!("error: {text}");
    }

    fn clear_error(&self) {}
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quantity(String),
    Unit(String),
    Calculate,
    Show,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));
        let command = match verb {
            "q" | "qty" | "quantity" => Command::Quantity(rest.to_string()),
            "u" | "unit" if !rest.is_empty() => Command::Unit(rest.to_string()),
            "c" | "calc" | "calculate" => Command::Calculate,
            "s" | "show" => Command::Show,
            "quit" | "exit" => Command::Quit,
            // A bare value is typed straight into the quantity box.
            _ if rest.is_empty() && verb.parse::<f64>().is_ok() => {
                Command::Quantity(verb.to_string())
            }
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }
}

async fn open_product_page(
    http: &reqwest::Client,
    server_url: &str,
    product_id: &ProductId,
) -> Result<(Option<ProductPage>, CookieJarCredentials)> {
    let url = format!("{}{}", server_url.trim_end_matches('/'), product_page_route(product_id));
    let response = http
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to open product page {url}"))?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok((None, CookieJarCredentials::default()));
    }
    let response = response.error_for_status()?;
    let cookies = CookieJarCredentials::from_set_cookie(
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    );
    let page = response
        .json::<ProductPage>()
        .await
        .context("product page was not valid JSON")?;
    Ok((Some(page), cookies))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let config = args.lookup_config();

    let http = reqwest::Client::new();
    let product_id = ProductId::new(args.product_id.clone());
    let (page, cookies) = open_product_page(&http, &args.server_url, &product_id).await?;
    let form = TerminalForm::new(page.as_ref());
    let service = HttpPriceService::with_client(http, &args.server_url, &config, cookies)?;

    let Some(controller) = PriceLookupController::bind(form, service, config) else {
        println!("product {product_id} has no page; nothing to price");
        return Ok(());
    };
    if let Some(page) = &page {
        let units = page
            .units
            .iter()
            .map(|choice| format!("{} ({})", choice.value, choice.label))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{}: {} per {}; units: {units}",
            page.name, page.price_per_unit, page.base_unit
        );
    }
    println!("commands: q <quantity>, u <unit>, calc, show, quit");
    info!(%product_id, "price lookup ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        debug!(?command, "terminal command");
        match command {
            Command::Quantity(value) => {
                controller.form().set_quantity(&value);
                controller.schedule_recalculation();
            }
            Command::Unit(value) => {
                controller.form().set_unit(&value);
                controller.schedule_recalculation();
            }
            Command::Calculate => {
                controller.recalculate_now().await;
            }
            Command::Show => {
                let form = controller.form();
                println!("quantity: {} {}", form.quantity(), form.unit());
            }
            Command::Quit => break,
            Command::Unknown(line) => eprintln!("unrecognised command: {line}"),
        }
    }

    // A debounced run may still be waiting or already in flight.
    controller.settle().await;
    Ok(())
}
