use std::collections::BTreeMap;

use url::Url;

use common::checktree::CheckTree;
use common::data::{Configuration, ResourceRef};
use common::payloads::{CreateConfiguration, WfsRelation};

use crate::error::ApiError;
use crate::http::ApiClient;

pub struct ConfigurationClient<'a> {
    api: &'a ApiClient,
}

impl<'a> ConfigurationClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "configurations")
    }

    pub async fn create(
        &self,
        datastore: &str,
        body: &CreateConfiguration,
    ) -> Result<Configuration, ApiError> {
        self.api.post(&self.base_url(datastore), body).await
    }

    pub async fn get(&self, datastore: &str, configuration: &str) -> Result<Configuration, ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), configuration);
        self.api.get(&url).await
    }

    /// Replace the publication metadata of an existing configuration; the
    /// offerings built on it pick the change up server-side.
    pub async fn update(
        &self,
        datastore: &str,
        configuration: &str,
        body: &CreateConfiguration,
    ) -> Result<Configuration, ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), configuration);
        self.api.put(&url, body).await
    }

    pub async fn add_tags(
        &self,
        datastore: &str,
        configuration: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        let url = format!("{}/{}/tags", self.base_url(datastore), configuration);
        self.api.post_unit(&url, tags).await
    }

    pub async fn delete(&self, datastore: &str, configuration: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), configuration);
        self.api.delete(&url).await
    }

    pub async fn list_for_stored_data(
        &self,
        datastore: &str,
        stored_data: &str,
    ) -> Result<Vec<Configuration>, ApiError> {
        let url =
            Url::parse_with_params(&self.base_url(datastore), &[("stored_data", stored_data)])
                .unwrap();
        let refs: Vec<ResourceRef> = self.api.get(url.as_str()).await?;
        let mut configurations = Vec::with_capacity(refs.len());
        for r in refs {
            configurations.push(self.get(datastore, &r.id).await?);
        }
        Ok(configurations)
    }
}

/// WFS relations out of a table-selection tree (tables as roots, attributes
/// as children). A table is published when any of it is checked.
pub fn relations_from_tree(tree: &CheckTree<String>) -> Vec<WfsRelation> {
    tree.selected_roots()
        .into_iter()
        .map(|table| WfsRelation::from_table(table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_follow_the_selection() {
        let mut tree = CheckTree::new();
        let commune = tree.add_root("commune".to_string());
        let nom = tree.add_child(commune, "nom".to_string());
        let departement = tree.add_root("departement".to_string());
        let _ = tree.add_child(departement, "code".to_string());

        tree.set_checked(nom, true);
        let relations = relations_from_tree(&tree);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].native_name, "commune");

        tree.set_checked(departement, true);
        assert_eq!(relations_from_tree(&tree).len(), 2);

        tree.set_checked(nom, false);
        let relations = relations_from_tree(&tree);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].native_name, "departement");
    }
}
