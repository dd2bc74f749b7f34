mod table;

use table::{Align, IntoTable, Table};

use crate::catalog::{ranking::ModelRanker, Catalog, CatalogEntry};
use crate::cli::router_client;
use crate::config::Config;
use crate::{die, warn};
use crate::utils::errors::with_sources;
use crate::{ListArgs, ListObject, ListingFormat};

#[derive(Debug, PartialEq, serde::Serialize)]
struct Model {
    model_id: String,
    provider: String,
    name: String,
}

impl From<Vec<Model>> for Table {
    fn from(value: Vec<Model>) -> Self {
        let mut tab = Table::new(vec!["MODEL", "PROVIDER"]);

        for model in value {
            tab.add_row(vec![model.model_id, model.provider]);
        }

        tab
    }
}

#[derive(Debug, PartialEq, serde::Serialize)]
struct Provider {
    provider: String,
    models: usize,
}

impl From<Vec<Provider>> for Table {
    fn from(value: Vec<Provider>) -> Self {
        let mut tab = Table::new(vec!["PROVIDER", "MODELS"]).align(1, Align::Right);

        for provider in value {
            tab.add_row(vec![provider.provider, provider.models.to_string()]);
        }

        tab
    }
}

/// Models in ranked order, optionally limited to one provider.
fn get_models(catalog: &Catalog, provider: Option<&str>) -> Vec<Model> {
    let entries: Box<dyn Iterator<Item = &CatalogEntry> + '_> = match provider {
        Some(provider) => Box::new(catalog.by_provider(provider)),
        None => Box::new(catalog.entries().iter()),
    };

    entries
        .map(|e| Model {
            model_id: e.qualified_id(),
            provider: e.provider_name.to_lowercase(),
            name: e.name.clone(),
        })
        .collect()
}

fn get_providers(catalog: &Catalog) -> Vec<Provider> {
    catalog
        .provider_counts()
        .into_iter()
        .map(|(provider, models)| Provider { provider, models })
        .collect()
}

fn format_output<O: IntoTable + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize listing: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) async fn list_cmd(config: &Config, args: &ListArgs) {
    let format = args.format;

    let client = router_client(config);
    let ranker = ModelRanker::new(&config.catalog.families);

    let catalog = match Catalog::fetch(&client, &ranker).await {
        Ok(catalog) => catalog,
        Err(err) => die!("failed to list models: {}", with_sources(&err)),
    };

    if catalog.is_empty() {
        warn!("the router lists no models");
    }

    match &args.object {
        ListObject::Models(args) => {
            let provider = args.provider.as_deref();
            let models = get_models(&catalog, provider);

            if let (Some(provider), true) = (provider, models.is_empty()) {
                die!("failed to list models: provider \"{}\" serves no models", provider);
            }

            format_output(models, format);
        }
        ListObject::Providers => {
            let providers = get_providers(&catalog);

            format_output(providers, format);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(
            &ModelRanker::default(),
            vec![
                CatalogEntry::new("OpenAI", "gpt-3.5-turbo"),
                CatalogEntry::new("Azure", "gpt-4"),
                CatalogEntry::new("OpenAI", "gpt-4"),
                CatalogEntry::new("router", "smart"),
            ],
        )
    }

    #[test]
    fn test_get_models() {
        let ids: Vec<String> = get_models(&catalog(), None)
            .into_iter()
            .map(|m| m.model_id)
            .collect();

        assert_eq!(
            ids,
            ["azure/gpt-4", "openai/gpt-4", "openai/gpt-3.5-turbo", "router/smart"]
        );

        assert_eq!(
            get_models(&catalog(), Some("OPENAI")),
            vec![
                Model {
                    model_id: "openai/gpt-4".to_string(),
                    provider: "openai".to_string(),
                    name: "gpt-4".to_string(),
                },
                Model {
                    model_id: "openai/gpt-3.5-turbo".to_string(),
                    provider: "openai".to_string(),
                    name: "gpt-3.5-turbo".to_string(),
                },
            ]
        );

        assert!(get_models(&catalog(), Some("mistral")).is_empty());
    }

    #[test]
    fn test_providers_table() {
        let tab: Table = get_providers(&catalog()).into();

        assert_eq!(
            tab.to_string(),
            "PROVIDER  MODELS\nazure          1\nopenai         2\nrouter         1\n"
        );
    }

    #[test]
    fn test_json_listing() {
        let json = serde_json::to_value(get_providers(&catalog())).unwrap();

        assert_eq!(
            json,
            serde_json::json!([
                {"provider": "azure", "models": 1},
                {"provider": "openai", "models": 2},
                {"provider": "router", "models": 1},
            ])
        );
    }
}
