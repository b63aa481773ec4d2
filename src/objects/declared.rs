//! Data-driven objects whose behaviour is fully described by a [`ClassSpec`].

use super::{ClassSpec, ConfigObject};
use crate::option::OptionFields;
use std::any::Any;

/// A configuration object backed only by its class spec and field values.
#[derive(Debug, Clone)]
pub struct DeclaredObject {
    spec: &'static ClassSpec,
    fields: OptionFields,
}

impl DeclaredObject {
    pub fn new(spec: &'static ClassSpec) -> Self {
        Self {
            spec,
            fields: OptionFields::from_tables(spec.class_name, spec.options),
        }
    }

    pub fn boxed(spec: &'static ClassSpec) -> Box<dyn ConfigObject> {
        Box::new(Self::new(spec))
    }
}

impl ConfigObject for DeclaredObject {
    fn class_spec(&self) -> &'static ClassSpec {
        self.spec
    }

    fn fields(&self) -> &OptionFields {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut OptionFields {
        &mut self.fields
    }

    fn box_clone(&self) -> Box<dyn ConfigObject> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
