use crate::provider::ProviderError;
use async_trait::async_trait;

/// Locally tracked state of a resource instance.
pub trait ResourceState: Default + Send {
    /// Identifier of the remote object, `None` once it is known not to exist.
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: Option<String>);
}

/// Lifecycle operations every resource type supports.
///
/// Each operation works on the caller's state in place: `create` assigns the
/// identifier, `read` refreshes the fields and clears the identifier when the
/// remote object has disappeared, `delete` clears it once the object is gone.
#[async_trait]
pub trait Resource: Send + Sync {
    type State: ResourceState;

    /// Registered type name, e.g. `vaultgrafanacloud_secret_role`.
    fn type_name(&self) -> &'static str;

    async fn create(&self, state: &mut Self::State) -> Result<(), ProviderError>;

    async fn read(&self, state: &mut Self::State) -> Result<(), ProviderError>;

    async fn update(&self, state: &mut Self::State) -> Result<(), ProviderError>;

    async fn delete(&self, state: &mut Self::State) -> Result<(), ProviderError>;

    /// Adopts an existing remote object by identifier.
    async fn import(&self, id: &str) -> Result<Self::State, ProviderError> {
        let mut state = Self::State::default();
        state.set_id(Some(id.to_string()));
        self.read(&mut state).await?;
        Ok(state)
    }
}
