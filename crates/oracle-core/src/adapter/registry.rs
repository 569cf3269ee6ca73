use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::Adapter;
use crate::errors::JobError;

/// Registro de adapters (clave insensible a mayúsculas).
///
/// Se construye al arrancar el nodo y es de sólo lectura después: no existe
/// registro dinámico durante la ejecución. Se comparte entre workers como
/// `Arc<AdapterRegistry>`.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: IndexMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra `adapter` bajo `name`. Un nombre repetido reemplaza al previo.
    pub fn register<A>(mut self, name: &str, adapter: A) -> Self
        where A: Adapter + 'static
    {
        self.adapters.insert(name.to_lowercase(), Arc::new(adapter));
        self
    }

    /// Resuelve un tipo de adapter. El error conserva el nombre tal como lo
    /// escribió el usuario.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Adapter>, JobError> {
        self.adapters
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| JobError::UnsupportedAdapterType(name.to_string()))
    }

    pub fn supports(&self, name: &str) -> bool {
        self.adapters.contains_key(&name.to_lowercase())
    }

    /// Tipos registrados, en orden de registro.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
         .field("types", &self.adapters.keys().collect::<Vec<_>>())
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AdapterError;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    struct Echo;

    #[async_trait]
    impl Adapter for Echo {
        async fn perform(&self, input: &Value, _params: &Map<String, Value>) -> Result<Value, AdapterError> {
            Ok(input.clone())
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = AdapterRegistry::new().register("HttpGet", Echo);
        assert!(registry.supports("httpget"));
        assert!(registry.supports("HTTPGET"));
        assert!(registry.resolve("httpGet").is_ok());
    }

    #[test]
    fn unknown_type_keeps_user_spelling() {
        let registry = AdapterRegistry::new().register("noop", Echo);
        let err = registry.resolve("IdoNotExist").err().expect("must fail");
        assert_eq!(err.to_string(), "IdoNotExist is not a supported adapter type");
    }

    #[test]
    fn types_follow_registration_order() {
        let registry = AdapterRegistry::new().register("b", Echo).register("A", Echo);
        assert_eq!(registry.types().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
