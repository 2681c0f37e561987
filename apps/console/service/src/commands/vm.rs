//! Virtual machine operations. Parameter order is the RPC argument order,
//! which is not always the path order (the core wants `action` before `id`).

use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "vm.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
                ParamSpec::number("state", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "vm.pool.monitoring",
            HttpMethod::Get,
            true,
            vec![ParamSpec::number("seconds", Query, -1)],
        ),
        OperationDescriptor::new(
            "vm.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "vm.allocate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("pending", Body, false),
            ],
        ),
        OperationDescriptor::new(
            "vm.deploy",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("host", Body, -1),
                ParamSpec::flag("enforce", Body, false),
                ParamSpec::number("datastore", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "vm.action",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::text("action", Body, ""),
                ParamSpec::number("id", Path, -1),
            ],
        ),
        OperationDescriptor::new(
            "vm.terminate",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("hard", Body, false),
            ],
        ),
        OperationDescriptor::new(
            "vm.poweroff",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("hard", Body, false),
            ],
        ),
        OperationDescriptor::new(
            "vm.reboot",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("hard", Body, false),
            ],
        ),
        OperationDescriptor::new(
            "vm.resume",
            HttpMethod::Put,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
        OperationDescriptor::new(
            "vm.rename",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "vm.resize",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("enforce", Body, false),
            ],
        ),
        OperationDescriptor::new(
            "vm.migrate",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("host", Body, -1),
                ParamSpec::flag("live", Body, false),
                ParamSpec::flag("enforce", Body, false),
                ParamSpec::number("datastore", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "vm.snapshot.create",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "vm.snapshot.revert",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("snapshot", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "vm.snapshot.delete",
            HttpMethod::Delete,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("snapshot", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "vm.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "vm.delete",
            HttpMethod::Delete,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
    ]
}
