//! Cross-module ECS scenarios
