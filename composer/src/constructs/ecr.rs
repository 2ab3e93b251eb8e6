use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::{json, Value};

pub struct EcrRepositoryParams<'a> {
    pub name: &'a str,
    /// Tag whose images are kept mutable and limited to a single copy
    pub prod_tag: &'a str,
    /// Prefix for development images, kept mutable, limited to five copies
    pub dev_prefix: &'a str,
}

/// ECR repository with scan-on-push and the retention lifecycle
///
/// Tags are immutable except for the prod tag and the dev prefix, which are
/// rewritten on every push.
pub struct EcrRepository {
    handle: Handle,
}

impl EcrRepository {
    pub fn new(stack: &mut Stack, id: &str, params: EcrRepositoryParams<'_>) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "repository name must not be empty"));
        }
        if params.prod_tag.is_empty() || params.dev_prefix.is_empty() {
            return Err(Error::invalid(id, "prod tag and dev prefix must not be empty"));
        }

        let lifecycle = Self::lifecycle_policy(params.prod_tag, params.dev_prefix);
        let logical_id = format!("Repository{}", escape_logical_id(id));

        let handle = stack.add_resource(CfnResource {
            name: logical_id,
            resource: json!({
                "Type": "AWS::ECR::Repository",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "RepositoryName": params.name,
                    "ImageScanningConfiguration": { "ScanOnPush": true },
                    "ImageTagMutability": "IMMUTABLE_WITH_EXCLUSION",
                    "ImageTagMutabilityExclusionFilters": [
                        {
                            "ImageTagMutabilityExclusionFilterType": "WILDCARD",
                            "ImageTagMutabilityExclusionFilterValue": format!("{}*", params.dev_prefix)
                        },
                        {
                            "ImageTagMutabilityExclusionFilterType": "WILDCARD",
                            "ImageTagMutabilityExclusionFilterValue": params.prod_tag
                        }
                    ],
                    "EmptyOnDelete": true,
                    "LifecyclePolicy": {
                        "LifecyclePolicyText": lifecycle.to_string()
                    }
                }
            }),
        })?;

        Ok(EcrRepository { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Repository URI token, for container image references
    pub fn uri(&self) -> Value {
        self.handle.att("RepositoryUri")
    }

    fn lifecycle_policy(prod_tag: &str, dev_prefix: &str) -> Value {
        json!({
            "rules": [
                {
                    "rulePriority": 1,
                    "description": "Only one image with the prod tag",
                    "selection": {
                        "tagStatus": "tagged",
                        "tagPrefixList": [prod_tag],
                        "countType": "imageCountMoreThan",
                        "countNumber": 1
                    },
                    "action": { "type": "expire" }
                },
                {
                    "rulePriority": 2,
                    "description": "Max 5 dev images",
                    "selection": {
                        "tagStatus": "tagged",
                        "tagPrefixList": [dev_prefix],
                        "countType": "imageCountMoreThan",
                        "countNumber": 5
                    },
                    "action": { "type": "expire" }
                },
                {
                    "rulePriority": 3,
                    "description": "No untagged images older than a day",
                    "selection": {
                        "tagStatus": "untagged",
                        "countType": "sinceImagePushed",
                        "countUnit": "days",
                        "countNumber": 1
                    },
                    "action": { "type": "expire" }
                },
                {
                    "rulePriority": 4,
                    "description": "Expire images older than 30 days",
                    "selection": {
                        "tagStatus": "any",
                        "countType": "sinceImagePushed",
                        "countUnit": "days",
                        "countNumber": 30
                    },
                    "action": { "type": "expire" }
                }
            ]
        })
    }
}
