//! Plain-text email templates.
//!
//! Each function renders one notification. Recipients are resolved by the
//! calling service.

use granite_core::EmailConfig;

use super::OutboundEmail;

fn signed(config: &EmailConfig, body: String) -> String {
    format!("{body}\n\nThank you,\n{}", config.signature)
}

fn allocation_url(config: &EmailConfig, allocation_id: uuid::Uuid) -> String {
    format!("{}/allocations/{}", config.base_url, allocation_id)
}

pub fn allocation_activated(
    config: &EmailConfig,
    to: Vec<String>,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    project_title: &str,
) -> OutboundEmail {
    OutboundEmail {
        to,
        subject: format!("Allocation Activated - {}", config.center_name),
        body: signed(
            config,
            format!(
                "Your allocation of {resource_name} for project \"{project_title}\" has been activated.\n\n{}",
                allocation_url(config, allocation_id)
            ),
        ),
    }
}

pub fn allocation_status_changed(
    config: &EmailConfig,
    to: Vec<String>,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    project_title: &str,
    status_label: &str,
) -> OutboundEmail {
    OutboundEmail {
        to,
        subject: format!("Allocation {status_label} - {}", config.center_name),
        body: signed(
            config,
            format!(
                "The status of your allocation of {resource_name} for project \"{project_title}\" \
                 has changed to {status_label}.\n\n\
                 If you have any questions, contact {}.\n\n{}",
                config.ticket_address,
                allocation_url(config, allocation_id)
            ),
        ),
    }
}

pub fn new_allocation_request(
    config: &EmailConfig,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    project_title: &str,
    pi_username: &str,
) -> OutboundEmail {
    OutboundEmail {
        to: vec![config.ticket_address.clone()],
        subject: format!("New Allocation Request: {project_title} - {resource_name}"),
        body: format!(
            "A new allocation of {resource_name} has been requested for project \
             \"{project_title}\" (PI: {pi_username}).\n\nReview it at {}",
            allocation_url(config, allocation_id)
        ),
    }
}

pub fn change_request_created(
    config: &EmailConfig,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    project_title: &str,
) -> OutboundEmail {
    OutboundEmail {
        to: vec![config.ticket_address.clone()],
        subject: format!("New Allocation Change Request: {project_title} - {resource_name}"),
        body: format!(
            "A change has been requested for the allocation of {resource_name} in project \
             \"{project_title}\".\n\nReview it at {}",
            allocation_url(config, allocation_id)
        ),
    }
}

pub fn change_request_resolved(
    config: &EmailConfig,
    to: Vec<String>,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    project_title: &str,
    approved: bool,
) -> OutboundEmail {
    let outcome = if approved { "Approved" } else { "Denied" };
    OutboundEmail {
        to,
        subject: format!("Allocation Change {outcome} - {}", config.center_name),
        body: signed(
            config,
            format!(
                "Your change request for the allocation of {resource_name} in project \
                 \"{project_title}\" has been {}.\n\n{}",
                outcome.to_lowercase(),
                allocation_url(config, allocation_id)
            ),
        ),
    }
}

pub fn users_added(
    config: &EmailConfig,
    to: Vec<String>,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    usernames: &[String],
) -> OutboundEmail {
    OutboundEmail {
        to,
        subject: format!("Users Added to Allocation - {}", config.center_name),
        body: signed(
            config,
            format!(
                "The following users were added to the allocation of {resource_name}: {}.\n\n{}",
                usernames.join(", "),
                allocation_url(config, allocation_id)
            ),
        ),
    }
}

pub fn users_removed(
    config: &EmailConfig,
    to: Vec<String>,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    usernames: &[String],
) -> OutboundEmail {
    OutboundEmail {
        to,
        subject: format!("Users Removed from Allocation - {}", config.center_name),
        body: signed(
            config,
            format!(
                "The following users were removed from the allocation of {resource_name}: {}.\n\n{}",
                usernames.join(", "),
                allocation_url(config, allocation_id)
            ),
        ),
    }
}

pub fn eula_pending(
    config: &EmailConfig,
    to: Vec<String>,
    allocation_id: uuid::Uuid,
    resource_name: &str,
) -> OutboundEmail {
    OutboundEmail {
        to,
        subject: format!("Agreement Required - {resource_name}"),
        body: signed(
            config,
            format!(
                "You have been added to an allocation of {resource_name}. Access requires \
                 accepting the user agreement:\n\n{}",
                allocation_url(config, allocation_id)
            ),
        ),
    }
}

pub fn eula_reviewed(
    config: &EmailConfig,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    username: &str,
    accepted: bool,
) -> OutboundEmail {
    let verdict = if accepted { "accepted" } else { "declined" };
    OutboundEmail {
        to: vec![config.ticket_address.clone()],
        subject: format!("Allocation User Agreement {verdict}: {username}"),
        body: format!(
            "User {username} has {verdict} the agreement for the allocation of \
             {resource_name}.\n\n{}",
            allocation_url(config, allocation_id)
        ),
    }
}

pub fn renewal_requested(
    config: &EmailConfig,
    allocation_id: uuid::Uuid,
    resource_name: &str,
    project_title: &str,
) -> OutboundEmail {
    OutboundEmail {
        to: vec![config.ticket_address.clone()],
        subject: format!("Allocation Renewal Request: {project_title} - {resource_name}"),
        body: format!(
            "A renewal has been requested for the allocation of {resource_name} in project \
             \"{project_title}\".\n\nReview it at {}",
            allocation_url(config, allocation_id)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: Some("smtp.example.edu".into()),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            sender: "noreply@example.edu".into(),
            ticket_address: "hpc-support@example.edu".into(),
            center_name: "Example HPC".into(),
            signature: "Example HPC Team".into(),
            base_url: "https://hpc.example.edu".into(),
        }
    }

    #[test]
    fn test_status_email_names_status_and_links_allocation() {
        let id = uuid::Uuid::new_v4();
        let email = allocation_status_changed(
            &config(),
            vec!["pi@example.edu".into()],
            id,
            "gpu-cluster",
            "Protein Folding",
            "Revoked",
        );
        assert!(email.subject.contains("Revoked"));
        assert!(email.body.contains("gpu-cluster"));
        assert!(email.body.contains(&id.to_string()));
        assert!(email.body.ends_with("Example HPC Team"));
    }

    #[test]
    fn test_admin_notifications_go_to_ticket_address() {
        let email = new_allocation_request(
            &config(),
            uuid::Uuid::new_v4(),
            "storage",
            "Genomics",
            "pi_dana",
        );
        assert_eq!(email.to, vec!["hpc-support@example.edu"]);
        assert!(email.body.contains("pi_dana"));
    }
}
