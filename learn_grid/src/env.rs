/// Outcome of a single environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f64,
    /// The episode reached a terminal state (goal reached, pole fallen).
    pub terminated: bool,
    /// The episode was cut short by a step limit.
    pub truncated: bool,
}

impl<O> Step<O> {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Gym-style environment driven one action at a time.
pub trait Environment {
    type Observation: Clone;
    type Action: Copy;

    fn reset(&mut self) -> Self::Observation;
    fn step(&mut self, action: Self::Action) -> Step<Self::Observation>;
    fn render(&self) -> String;

    /// Prints the current state to stdout.
    fn draw(&self) {
        println!("{}", self.render());
    }
}
