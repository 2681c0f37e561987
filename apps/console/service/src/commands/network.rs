//! Virtual network operations, including address-range management.

use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "network.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "network.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "network.allocate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::text("template", Body, ""),
                ParamSpec::number("cluster", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "network.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "network.reserve",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "network.ar.add",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "network.ar.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "network.ar.free",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("ar", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "network.hold",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("ip", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "network.release",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("ip", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "network.rename",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "network.delete",
            HttpMethod::Delete,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
    ]
}
