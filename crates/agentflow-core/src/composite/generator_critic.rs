//! Composición generador-crítico.
//!
//! Itera hasta `n_rounds` rondas de un sub-flow generador y uno crítico.
//! Los roles se asignan explícitamente en construcción (`GcRoles`), nunca
//! por convención de nombres. La ronda se corta antes del crítico cuando la
//! clave de fin-de-interacción se vuelve verdadera en el estado del padre.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::composite::{call_child, output_data_of, state_key_is_truthy, ChildSlot};
use crate::config::FlowConfig;
use crate::errors::FlowError;
use crate::flow::{Flow, FlowKernel};
use crate::message::Payload;

/// Asignación explícita de roles: qué hijo genera y qué hijo critica.
#[derive(Debug, Clone)]
pub struct GcRoles {
    pub generator: String,
    pub critic: String,
}

pub struct GeneratorCriticFlow {
    kernel: FlowKernel,
    generator: ChildSlot,
    critic: ChildSlot,
    n_rounds: usize,
    init_generator_every_round: bool,
    init_critic_every_round: bool,
    eoi_key: String,
}

impl std::fmt::Debug for GeneratorCriticFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorCriticFlow")
         .field("name", &self.kernel.name())
         .field("generator", &self.generator.name)
         .field("critic", &self.critic.name)
         .field("n_rounds", &self.n_rounds)
         .field("eoi_key", &self.eoi_key)
         .finish_non_exhaustive()
    }
}

impl GeneratorCriticFlow {
    pub fn required_config_keys() -> &'static [&'static str] {
        &["name", "description", "n_rounds"]
    }

    pub fn default_config() -> Value {
        json!({
            "name": "GeneratorCriticFlow",
            "description": "Iterates a generator and a critic child flow",
            "init_generator_every_round": false,
            "init_critic_every_round": true,
        })
    }

    /// Valida la topología (exactamente dos hijos, roles distintos y
    /// presentes) y resuelve la clave de fin-de-interacción: la configurada
    /// en `eoi_key`, o la designada por el generador (que debe figurar
    /// entre sus salidas declaradas).
    pub fn from_config(config: FlowConfig,
                       children: Vec<(String, Box<dyn Flow>)>,
                       roles: GcRoles)
                       -> Result<Self, FlowError> {
        if children.len() != 2 {
            return Err(FlowError::InvalidTopology(format!("generator-critic composition needs exactly two child flows, got {}",
                                                          children.len())));
        }
        if roles.generator == roles.critic {
            return Err(FlowError::InvalidTopology("generator and critic roles must name two distinct children".to_string()));
        }

        let mut generator = None;
        let mut critic = None;
        for (name, flow) in children {
            if name == roles.generator {
                generator = Some(ChildSlot { name, flow });
            } else if name == roles.critic {
                critic = Some(ChildSlot { name, flow });
            } else {
                return Err(FlowError::InvalidTopology(format!("child `{name}` matches neither the generator nor the critic role")));
            }
        }
        let generator =
            generator.ok_or_else(|| FlowError::InvalidTopology(format!("no child named `{}` for the generator role",
                                                                       roles.generator)))?;
        let critic = critic.ok_or_else(|| FlowError::InvalidTopology(format!("no child named `{}` for the critic role",
                                                                             roles.critic)))?;

        let n_rounds = config.extra_u64("n_rounds")
                             .ok_or_else(|| FlowError::Config("n_rounds must be a non-negative integer".to_string()))?
                       as usize;
        let init_generator_every_round = config.extra_bool("init_generator_every_round").unwrap_or(false);
        let init_critic_every_round = config.extra_bool("init_critic_every_round").unwrap_or(true);

        let eoi_key = match config.extra_str("eoi_key") {
            Some(key) => key.to_string(),
            None => {
                let derived = generator.flow
                                       .end_of_interaction_key()
                                       .ok_or_else(|| {
                                           FlowError::InvalidTopology("no end-of-interaction key configured and the generator flow does not designate one".to_string())
                                       })?;
                if !generator.flow.kernel().config.output_interface.contains(&derived) {
                    return Err(FlowError::InvalidEoiKey(derived));
                }
                derived
            }
        };

        Ok(Self { kernel: FlowKernel::new(config),
                  generator,
                  critic,
                  n_rounds,
                  init_generator_every_round,
                  init_critic_every_round,
                  eoi_key })
    }

    /// Defaults del kind + overrides del llamador.
    pub fn instantiate_with_overrides(overrides: Value,
                                      children: Vec<(String, Box<dyn Flow>)>,
                                      roles: GcRoles)
                                      -> Result<Self, FlowError> {
        let config = FlowConfig::build(Self::default_config(), overrides, Self::required_config_keys())?;
        Self::from_config(config, children, roles)
    }

    pub fn generator(&self) -> &dyn Flow {
        self.generator.flow.as_ref()
    }

    pub fn critic(&self) -> &dyn Flow {
        self.critic.flow.as_ref()
    }

    fn is_eoi(&self) -> bool {
        state_key_is_truthy(&self.kernel, &self.eoi_key)
    }
}

impl Flow for GeneratorCriticFlow {
    fn kernel(&self) -> &FlowKernel {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut FlowKernel {
        &mut self.kernel
    }

    fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
        let src = self.kernel.name().to_string();
        let mut parents: Vec<Uuid> = self.kernel.current_input().into_iter().collect();
        let mut carried = input_data.clone();

        for round in 0..self.n_rounds {
            if self.init_generator_every_round && round > 0 {
                self.generator.flow.reset(true, true, &src);
            }

            let generator_answer = call_child(&mut self.kernel, &mut self.generator, &carried, &parents)?;

            if self.is_eoi() {
                log::info!("End of interaction detected");
                break;
            }

            if self.init_critic_every_round && round > 0 {
                self.critic.flow.reset(true, true, &src);
            }

            let generator_data = output_data_of(&generator_answer);
            let critic_answer = call_child(&mut self.kernel,
                                           &mut self.critic,
                                           &generator_data,
                                           &[generator_answer.id])?;

            carried = output_data_of(&critic_answer);
            parents = vec![critic_answer.id];
        }

        self.kernel.select_outputs()
    }

    fn subflows_mut(&mut self) -> Vec<&mut dyn Flow> {
        vec![self.generator.flow.as_mut(), self.critic.flow.as_mut()]
    }
}
