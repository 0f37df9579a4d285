use crate::domain::ports::{Storage, Transformation};

/// 依宣告順序執行的 transformation 集合。
/// 群組由 `Pipeline::run_transformations` 以單一交易執行：
/// 任何一步失敗，整個群組都不會寫入目的地。
pub struct TransformationGroup<S: Storage> {
    name: String,
    steps: Vec<Box<dyn Transformation<S>>>,
}

impl<S: Storage> TransformationGroup<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: Box<dyn Transformation<S>>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_step(&mut self, step: Box<dyn Transformation<S>>) {
        self.steps.push(step);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Box<dyn Transformation<S>>] {
        &self.steps
    }
}
