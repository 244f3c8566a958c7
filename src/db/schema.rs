diesel::table! {
    genesis_vip (vtap_id, ip) {
        vtap_id -> Integer,
        ip -> Text,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_vm (vtap_id, lcuuid) {
        vtap_id -> Integer,
        lcuuid -> Text,
        name -> Text,
        label -> Text,
        vpc_lcuuid -> Text,
        launch_server -> Text,
        state -> Integer,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_vpc (vtap_id, lcuuid) {
        vtap_id -> Integer,
        lcuuid -> Text,
        name -> Text,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_host (vtap_id, lcuuid) {
        vtap_id -> Integer,
        lcuuid -> Text,
        hostname -> Text,
        ip -> Text,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_port (vtap_id, lcuuid) {
        vtap_id -> Integer,
        lcuuid -> Text,
        mac -> Text,
        device_lcuuid -> Text,
        network_lcuuid -> Text,
        vpc_lcuuid -> Text,
        device_type -> Integer,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_lldp (vtap_id, host_ip, host_interface) {
        vtap_id -> Integer,
        host_ip -> Text,
        host_interface -> Text,
        system_name -> Text,
        management_address -> Text,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_ip (vtap_id, mac, ip) {
        vtap_id -> Integer,
        mac -> Text,
        ip -> Text,
        vinterface_lcuuid -> Text,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_network (vtap_id, lcuuid) {
        vtap_id -> Integer,
        lcuuid -> Text,
        name -> Text,
        segmentation_id -> Integer,
        vpc_lcuuid -> Text,
        external -> Bool,
        net_type -> Integer,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_vinterface (vtap_id, lcuuid) {
        vtap_id -> Integer,
        lcuuid -> Text,
        name -> Text,
        mac -> Text,
        ips -> Text,
        tap_name -> Text,
        tap_mac -> Text,
        device_lcuuid -> Text,
        device_type -> Text,
        host_ip -> Text,
        kubernetes_cluster_id -> Text,
        netns_id -> Integer,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_process (vtap_id, pid) {
        vtap_id -> Integer,
        pid -> Integer,
        lcuuid -> Text,
        name -> Text,
        process_name -> Text,
        cmd_line -> Text,
        user -> Text,
        start_time -> Timestamp,
        netns_id -> Integer,
        node_ip -> Text,
        last_seen -> Timestamp,
    }
}

diesel::table! {
    genesis_storage (vtap_id) {
        vtap_id -> Integer,
        node_ip -> Text,
    }
}

diesel::table! {
    vtap (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    domain (lcuuid) {
        lcuuid -> Text,
        name -> Text,
        #[sql_name = "type"]
        domain_type -> Integer,
        cluster_id -> Text,
        controller_ip -> Text,
    }
}

diesel::table! {
    sub_domain (lcuuid) {
        lcuuid -> Text,
        domain -> Text,
        cluster_id -> Text,
    }
}

diesel::table! {
    controller (ip) {
        ip -> Text,
        pod_ip -> Text,
        state -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    genesis_vip,
    genesis_vm,
    genesis_vpc,
    genesis_host,
    genesis_port,
    genesis_lldp,
    genesis_ip,
    genesis_network,
    genesis_vinterface,
    genesis_process,
    genesis_storage,
    vtap,
    domain,
    sub_domain,
    controller,
);
