use std::sync::Arc;

/// Behaviour shared by every clocked component in the store.
pub trait ModuleBehaviors {
    /// Advance the component by one step.
    fn tick_one(&mut self);

    /// Return the component to its power-on state.
    fn reset(&mut self) {}
}

pub trait Parameterizable {
    type ConfigType;

    fn conf(&self) -> &Self::ConfigType;

    fn init_conf(&mut self, conf: Arc<Self::ConfigType>);
}
